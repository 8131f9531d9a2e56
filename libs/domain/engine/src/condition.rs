// [libs/domain/engine/src/condition.rs]
/*!
 * =================================================================
 * APARATO: CONDITION SUBLANGUAGE (V1.3 - SANDBOXED PREDICATES)
 * CLASIFICACIÓN: DOMAIN SERVICES (ESTRATO L2)
 * RESPONSABILIDAD: EVALUACIÓN SEGURA DE CONDICIONES DE PASO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. GRAMÁTICA MÍNIMA: `expr := ['!'] term`, `term := path | path OP literal`,
 *    `OP ∈ {==, !=, >=, <=, >, <}`. Los paths son llaves punteadas sobre el
 *    ámbito de variables; los literales son escalares JSON.
 * 2. VERACIDAD JSON: null, false, 0, "", [] y {} son falsy; todo lo demás
 *    es truthy (el contrato del DSL de autoría).
 * 3. FAIL-OPEN: cualquier fallo de parseo o evaluación deja correr el
 *    paso, preservando el avance del proceso.
 * =================================================================
 */

use serde_json::Value;
use tracing::warn;

/// Fallo interno de evaluación. Nunca escapa: el llamador degrada a fail-open.
#[derive(Debug, PartialEq, Eq)]
enum ConditionFault {
    EmptyExpression,
    MalformedLiteral(String),
    IncomparableOperands,
}

/**
 * Evalúa una condición de paso contra el ámbito de variables.
 *
 * Retorna el veredicto del predicado; ante expresión malformada o
 * evaluación imposible retorna `true` (fail-open) y deja advertencia.
 */
pub fn evaluate_condition(condition_expression: &str, variable_scope: &Value) -> bool {
    match try_evaluate(condition_expression, variable_scope) {
        Ok(predicate_verdict) => predicate_verdict,
        Err(evaluation_fault) => {
            warn!(
                "⚠️  [CONDITION_FAIL_OPEN]: Expression '{}' unevaluable ({:?}). Step proceeds.",
                condition_expression, evaluation_fault
            );
            true
        }
    }
}

fn try_evaluate(condition_expression: &str, variable_scope: &Value) -> Result<bool, ConditionFault> {
    let trimmed_expression = condition_expression.trim();
    if trimmed_expression.is_empty() {
        return Err(ConditionFault::EmptyExpression);
    }

    // Negación prefija (un solo nivel, como el DSL de autoría)
    if let Some(negated_body) = trimmed_expression.strip_prefix('!') {
        return try_evaluate(negated_body, variable_scope).map(|verdict| !verdict);
    }

    // Operadores de dos caracteres primero para no partir '>=' en '>'
    for comparison_operator in ["==", "!=", ">=", "<=", ">", "<"] {
        if let Some((raw_path, raw_literal)) = trimmed_expression.split_once(comparison_operator) {
            let left_operand = resolve_path(raw_path.trim(), variable_scope);
            let right_operand: Value = serde_json::from_str(raw_literal.trim())
                .map_err(|_| ConditionFault::MalformedLiteral(raw_literal.trim().to_string()))?;

            return compare_operands(comparison_operator, &left_operand, &right_operand);
        }
    }

    // Path desnudo: veracidad JSON
    Ok(is_truthy(&resolve_path(trimmed_expression, variable_scope)))
}

/// Resuelve un path punteado dentro del ámbito; ausencia => null.
fn resolve_path(dotted_path: &str, variable_scope: &Value) -> Value {
    let mut cursor = variable_scope;
    for path_segment in dotted_path.split('.') {
        match cursor.get(path_segment) {
            Some(next_value) => cursor = next_value,
            None => return Value::Null,
        }
    }
    cursor.clone()
}

fn compare_operands(
    comparison_operator: &str,
    left_operand: &Value,
    right_operand: &Value,
) -> Result<bool, ConditionFault> {
    match comparison_operator {
        "==" => Ok(json_equal(left_operand, right_operand)),
        "!=" => Ok(!json_equal(left_operand, right_operand)),
        ordering_operator => {
            let ordering = ordered_comparison(left_operand, right_operand)
                .ok_or(ConditionFault::IncomparableOperands)?;
            Ok(match ordering_operator {
                ">" => ordering == std::cmp::Ordering::Greater,
                ">=" => ordering != std::cmp::Ordering::Less,
                "<" => ordering == std::cmp::Ordering::Less,
                "<=" => ordering != std::cmp::Ordering::Greater,
                _ => return Err(ConditionFault::IncomparableOperands),
            })
        }
    }
}

/// Igualdad con normalización numérica (1 == 1.0).
fn json_equal(left_operand: &Value, right_operand: &Value) -> bool {
    match (left_operand.as_f64(), right_operand.as_f64()) {
        (Some(left_number), Some(right_number)) => left_number == right_number,
        _ => left_operand == right_operand,
    }
}

/// Orden total sobre números (f64) y cadenas (lexicográfico).
fn ordered_comparison(left_operand: &Value, right_operand: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(left_number), Some(right_number)) = (left_operand.as_f64(), right_operand.as_f64()) {
        return left_number.partial_cmp(&right_number);
    }
    if let (Some(left_text), Some(right_text)) = (left_operand.as_str(), right_operand.as_str()) {
        return Some(left_text.cmp(right_text));
    }
    None
}

fn is_truthy(candidate_value: &Value) -> bool {
    match candidate_value {
        Value::Null => false,
        Value::Bool(boolean_value) => *boolean_value,
        Value::Number(numeric_value) => numeric_value.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(text_value) => !text_value.is_empty(),
        Value::Array(array_value) => !array_value.is_empty(),
        Value::Object(object_value) => !object_value.is_empty(),
    }
}
