//! Regras de validação compartilhadas entre entidades
//!
//! As regras simples (tamanho, faixa, email) ficam nas anotações `validator`
//! dos modelos. Aqui ficam as regras que cruzam mais de um campo.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use validator::ValidationError;

use crate::models::RepasseType;

/// Valor máximo de um repasse percentual, em pontos-base (100,00%)
pub const MAX_PERCENT_BASIS_POINTS: i64 = 10_000;

fn rule_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Valida o par tipo/valor de repasse.
///
/// - tipo ausente exige valor ausente
/// - tipo presente exige valor presente
/// - percentual: 0 <= valor <= 10000 (centésimos de ponto percentual)
/// - fixo: valor >= 0 (centavos)
pub fn check_repasse_pair(
    kind: Option<RepasseType>,
    value: Option<i64>,
) -> Result<(), ValidationError> {
    match (kind, value) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(rule_error(
            "repasse_value_without_type",
            "valor de repasse informado sem o tipo",
        )),
        (Some(_), None) => Err(rule_error(
            "repasse_type_without_value",
            "tipo de repasse informado sem o valor",
        )),
        (Some(RepasseType::Percent), Some(v)) if !(0..=MAX_PERCENT_BASIS_POINTS).contains(&v) => {
            Err(rule_error(
                "repasse_percent_range",
                "repasse percentual deve estar entre 0 e 10000",
            ))
        }
        (Some(RepasseType::Fixed), Some(v)) if v < 0 => Err(rule_error(
            "repasse_fixed_negative",
            "repasse fixo não pode ser negativo",
        )),
        _ => Ok(()),
    }
}

/// Exige que o fim seja estritamente posterior ao início
pub fn check_time_window(
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<(), ValidationError> {
    if end <= start {
        return Err(rule_error(
            "end_before_start",
            "o horário de término deve ser posterior ao de início",
        ));
    }
    Ok(())
}

/// Rejeita textos compostos apenas por espaços
pub fn check_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(rule_error("blank", "o conteúdo não pode ser vazio"));
    }
    Ok(())
}
