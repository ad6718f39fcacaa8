use crate::config::{AttributeKind, KeyKind};
use crate::stage::utils::{non_empty, norm_text, parse_f64, parse_int};
use crate::stage::ColumnRef;

/// One natural-key component.
///
/// Variant order is the sort order: values sort before `Null`, which is
/// what puts partially-null keys last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyPart {
    Int(i64),
    Text(String),
    Null,
}

impl KeyPart {
    /// Normalise a literal from configuration the same way a cell would be.
    pub fn from_literal(raw: &str, kind: KeyKind) -> Self {
        let v = match kind {
            KeyKind::Text => norm_text(raw).map(KeyPart::Text),
            KeyKind::Integer => parse_int(raw).map(KeyPart::Int),
        };
        v.unwrap_or(KeyPart::Null)
    }

    pub fn from_cell(col: &ColumnRef<'_>, row: usize, kind: KeyKind) -> Self {
        let v = match kind {
            KeyKind::Text => col.text(row).and_then(|s| norm_text(&s)).map(KeyPart::Text),
            KeyKind::Integer => col.int(row).map(KeyPart::Int),
        };
        v.unwrap_or(KeyPart::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, KeyPart::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            KeyPart::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            KeyPart::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Full natural-key tuple in declared column order. Ordering is
/// lexicographic over the parts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NaturalKey(pub Vec<KeyPart>);

impl NaturalKey {
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }
}

/// Non-key descriptive value carried on a dimension row.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    pub fn from_literal(raw: &str, kind: AttributeKind) -> Self {
        let v = match kind {
            AttributeKind::Text => non_empty(raw).map(AttrValue::Text),
            AttributeKind::Integer => parse_int(raw).map(AttrValue::Int),
            AttributeKind::Float => parse_f64(raw).map(AttrValue::Float),
        };
        v.unwrap_or(AttrValue::Null)
    }

    pub fn from_cell(col: &ColumnRef<'_>, row: usize, kind: AttributeKind) -> Self {
        let v = match kind {
            AttributeKind::Text => col.text(row).map(AttrValue::Text),
            AttributeKind::Integer => col.int(row).map(AttrValue::Int),
            AttributeKind::Float => col.float(row).map(AttrValue::Float),
        };
        v.unwrap_or(AttrValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_sort_last() {
        let mut keys = vec![
            NaturalKey(vec![KeyPart::Null, KeyPart::Int(1)]),
            NaturalKey(vec![KeyPart::Text("QUEENS".into()), KeyPart::Int(11101)]),
            NaturalKey(vec![KeyPart::Text("BRONX".into()), KeyPart::Null]),
            NaturalKey(vec![KeyPart::Text("BRONX".into()), KeyPart::Int(10451)]),
        ];
        keys.sort();
        assert_eq!(keys[0].parts()[1], KeyPart::Int(10451));
        assert_eq!(keys[1].parts()[1], KeyPart::Null);
        assert_eq!(keys[2].parts()[0].as_text(), Some("QUEENS"));
        assert!(keys[3].parts()[0].is_null());
    }

    #[test]
    fn literals_normalise_like_cells() {
        assert_eq!(KeyPart::from_literal(" ems ", KeyKind::Text), KeyPart::Text("EMS".into()));
        assert_eq!(KeyPart::from_literal("10001.0", KeyKind::Integer), KeyPart::Int(10001));
        assert_eq!(KeyPart::from_literal("x", KeyKind::Integer), KeyPart::Null);
        assert_eq!(AttrValue::from_literal("Medical", AttributeKind::Text), AttrValue::Text("Medical".into()));
    }
}
