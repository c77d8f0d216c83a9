//! Modelos de domínio da plataforma
//!
//! Cada submódulo agrupa a entidade persistida, os payloads de entrada
//! (com as anotações de validação) e os tipos de resposta do agregado.

pub mod anamnese;
pub mod appointment;
pub mod financial;
pub mod lead;
pub mod patient;
pub mod user;

pub use anamnese::*;
pub use appointment::*;
pub use financial::*;
pub use lead::*;
pub use patient::*;
pub use user::*;

pub(crate) fn default_true() -> bool {
    true
}
