//! Argument helpers shared by the built-in tools.

use serde_json::Value;

/// Field value as a trimmed string. Numbers and booleans are stringified,
/// so a phone sent as `5551234` is accepted.
pub fn field_str(args: &Value, path: &str) -> Option<String> {
    let value = path.split('.').try_fold(args, |v, key| v.get(key))?;
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Dotted paths among `required` that are absent or blank, in the given order.
pub fn missing_fields<'a, I>(args: &Value, required: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    required
        .into_iter()
        .filter(|path| field_str(args, path).is_none())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_str() {
        let args = json!({"name": "  Ana  ", "phone": 5551234, "blank": " ", "contact": {"email": "a@b.co"}});
        assert_eq!(field_str(&args, "name").as_deref(), Some("Ana"));
        assert_eq!(field_str(&args, "phone").as_deref(), Some("5551234"));
        assert_eq!(field_str(&args, "blank"), None);
        assert_eq!(field_str(&args, "contact.email").as_deref(), Some("a@b.co"));
        assert_eq!(field_str(&args, "contact.phone"), None);
        assert_eq!(field_str(&args, "contact"), None);
    }

    #[test]
    fn test_missing_fields_keeps_order() {
        let args = json!({"email": "a@b.co"});
        assert_eq!(
            missing_fields(&args, ["full_name", "email", "phone"]),
            vec!["full_name", "phone"]
        );
    }
}
