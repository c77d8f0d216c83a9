//! Handlers HTTP agrupados por recurso
//!
//! Cada handler extrai o usuário autenticado, valida a entrada e delega ao
//! repositório correspondente; o escopo por tenant é aplicado nas consultas.

pub mod anamnese;
pub mod appointments;
pub mod cost_centers;
pub mod families;
pub mod health;
pub mod leads;
pub mod patients;
pub mod payments;
pub mod repasses;
pub mod sessions;
pub mod users;
