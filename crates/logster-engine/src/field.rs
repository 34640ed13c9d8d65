use std::fmt;

/// How a captured field is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Integer,
}

/// A named field declared by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Integer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(u64),
}

impl FieldValue {
    pub fn as_integer(&self) -> Option<u64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(v) => write!(f, "{v}"),
        }
    }
}

/// A captured field could not be coerced into its declared kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field '{field}': cannot decode '{value}' as an integer")]
pub struct FieldDecodeError {
    pub field: String,
    pub value: String,
}

/// Decoded fields of one match, in rule declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: Vec<(String, FieldValue)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

pub(crate) fn decode(spec: &FieldSpec, raw: &str) -> Result<FieldValue, FieldDecodeError> {
    match spec.kind {
        FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
        FieldKind::Integer => raw
            .trim()
            .parse::<u64>()
            .map(FieldValue::Integer)
            .map_err(|_| FieldDecodeError {
                field: spec.name.clone(),
                value: raw.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_integer() {
        let spec = FieldSpec::integer("response");
        assert_eq!(decode(&spec, "2000").unwrap(), FieldValue::Integer(2000));
    }

    #[test]
    fn decode_integer_rejects_garbage() {
        let spec = FieldSpec::integer("code");
        let err = decode(&spec, "2x0").unwrap_err();
        assert_eq!(err.field, "code");
        assert_eq!(err.value, "2x0");
        assert!(err.to_string().contains("cannot decode"));
    }

    #[test]
    fn decode_text_is_verbatim() {
        let spec = FieldSpec::text("host");
        assert_eq!(
            decode(&spec, "dm-web01").unwrap(),
            FieldValue::Text("dm-web01".into())
        );
    }

    #[test]
    fn field_map_keeps_order_and_replaces() {
        let mut m = FieldMap::new();
        m.insert("host", FieldValue::Text("a".into()));
        m.insert("code", FieldValue::Integer(200));
        m.insert("host", FieldValue::Text("b".into()));
        let names: Vec<_> = m.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["host", "code"]);
        assert_eq!(m.get("host").unwrap().to_string(), "b");
        assert_eq!(m.get("code").and_then(FieldValue::as_integer), Some(200));
        assert!(m.get("missing").is_none());
    }
}
