//! Type coercion toward declared parameter types

use serde_json::Value;

use crate::tools::ParamType;

fn number_word(word: &str) -> Option<i64> {
    let n = match word {
        "zero" => 0,
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        "hundred" => 100,
        _ => return None,
    };
    Some(n)
}

/// Parse English number words: "ten", "twenty five", "two hundred", "three hundred and six"
pub fn parse_number_words(text: &str) -> Option<i64> {
    let lowered = text.trim().to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|w| !w.is_empty() && *w != "and")
        .collect();
    parse_words(&words)
}

fn parse_words(words: &[&str]) -> Option<i64> {
    match words {
        [] => None,
        [one] => number_word(one),
        [base, "hundred"] => Some(number_word(base)? * 100),
        [base, "hundred", rest @ ..] => Some(number_word(base)? * 100 + parse_words(rest)?),
        [tens, units] => {
            let tens = number_word(tens)?;
            let units = number_word(units)?;
            // "twenty five" yes, "five twenty" no
            (tens >= 20 && tens % 10 == 0 && units < 10).then_some(tens + units)
        }
        _ => None,
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(n);
    }
    if let Ok(f) = trimmed.parse::<f64>()
        && f.fract() == 0.0
        && f.is_finite()
    {
        return Some(f as i64);
    }
    parse_number_words(trimmed)
}

/// Coerce a value to the declared type; `None` when no coercion applies
pub fn coerce_value(value: &Value, ty: ParamType) -> Option<Value> {
    if ty.accepts(value) {
        return None;
    }
    match (ty, value) {
        (ParamType::Integer, Value::String(s)) => parse_integer(s).map(Value::from),
        (ParamType::Integer, Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| Value::from(f as i64)),
        (ParamType::Boolean, Value::String(s)) => parse_bool(s).map(Value::Bool),
        (ParamType::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },
        (ParamType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (ParamType::StringArray, Value::String(s)) => Some(split_list(s)),
        (ParamType::StringArray, Value::Array(items)) => {
            let strings: Option<Vec<Value>> = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Some(Value::String(s.clone())),
                    Value::Number(n) => Some(Value::String(n.to_string())),
                    _ => None,
                })
                .collect();
            strings.map(Value::Array)
        }
        _ => None,
    }
}

/// A JSON-encoded list, or a comma/newline separated one
fn split_list(text: &str) -> Value {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(text.trim())
        && items.iter().all(Value::is_string)
    {
        return Value::Array(items);
    }
    Value::Array(
        text.split([',', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_words() {
        assert_eq!(parse_number_words("ten"), Some(10));
        assert_eq!(parse_number_words("a"), Some(1));
        assert_eq!(parse_number_words("Twenty Five"), Some(25));
        assert_eq!(parse_number_words("twenty-five"), Some(25));
        assert_eq!(parse_number_words("two hundred"), Some(200));
        assert_eq!(parse_number_words("three hundred and six"), Some(306));
        assert_eq!(parse_number_words("one hundred forty two"), Some(142));
        assert_eq!(parse_number_words("five twenty"), None);
        assert_eq!(parse_number_words("lots"), None);
        assert_eq!(parse_number_words(""), None);
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce_value(&json!("42"), ParamType::Integer), Some(json!(42)));
        assert_eq!(coerce_value(&json!(" 7 "), ParamType::Integer), Some(json!(7)));
        assert_eq!(coerce_value(&json!("ten"), ParamType::Integer), Some(json!(10)));
        assert_eq!(coerce_value(&json!(3.0), ParamType::Integer), Some(json!(3)));
        assert_eq!(coerce_value(&json!(3.5), ParamType::Integer), None);
        assert_eq!(coerce_value(&json!(5), ParamType::Integer), None);
    }

    #[test]
    fn test_coerce_boolean() {
        assert_eq!(coerce_value(&json!("true"), ParamType::Boolean), Some(json!(true)));
        assert_eq!(coerce_value(&json!("No"), ParamType::Boolean), Some(json!(false)));
        assert_eq!(coerce_value(&json!(1), ParamType::Boolean), Some(json!(true)));
        assert_eq!(coerce_value(&json!("maybe"), ParamType::Boolean), None);
    }

    #[test]
    fn test_coerce_string_and_array() {
        assert_eq!(coerce_value(&json!(12), ParamType::String), Some(json!("12")));
        assert_eq!(
            coerce_value(&json!("a.txt, b.txt"), ParamType::StringArray),
            Some(json!(["a.txt", "b.txt"]))
        );
        assert_eq!(
            coerce_value(&json!(r#"["x", "y"]"#), ParamType::StringArray),
            Some(json!(["x", "y"]))
        );
        assert_eq!(coerce_value(&json!(["x"]), ParamType::StringArray), None);
    }
}
