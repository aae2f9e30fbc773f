//! Default source type → target field type mapping

use crate::types::{FieldType, SourceType};

/// Infer the default target field type for a source column type.
///
/// Total over all source types: anything without a dedicated mapping
/// (time, timestamp, binary, vendor-specific types) indexes as text.
pub fn infer_target_type(source: &SourceType) -> FieldType {
    match source {
        SourceType::Boolean => FieldType::Boolean,
        SourceType::TinyInt | SourceType::SmallInt | SourceType::Integer => FieldType::Integer,
        SourceType::BigInt | SourceType::Numeric => FieldType::Long,
        SourceType::Decimal | SourceType::Double => FieldType::Double,
        SourceType::Float | SourceType::Real => FieldType::Float,
        SourceType::Char
        | SourceType::NChar
        | SourceType::Varchar
        | SourceType::NVarchar
        | SourceType::LongVarchar
        | SourceType::Clob
        | SourceType::NClob => FieldType::Text,
        SourceType::Date => FieldType::Date,
        SourceType::Time | SourceType::Timestamp | SourceType::Binary | SourceType::Other(_) => {
            FieldType::Text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_mappings() {
        assert_eq!(infer_target_type(&SourceType::TinyInt), FieldType::Integer);
        assert_eq!(infer_target_type(&SourceType::Integer), FieldType::Integer);
        assert_eq!(infer_target_type(&SourceType::BigInt), FieldType::Long);
        assert_eq!(infer_target_type(&SourceType::Numeric), FieldType::Long);
        assert_eq!(infer_target_type(&SourceType::Decimal), FieldType::Double);
        assert_eq!(infer_target_type(&SourceType::Double), FieldType::Double);
        assert_eq!(infer_target_type(&SourceType::Float), FieldType::Float);
    }

    #[test]
    fn test_text_and_date_mappings() {
        assert_eq!(infer_target_type(&SourceType::Varchar), FieldType::Text);
        assert_eq!(infer_target_type(&SourceType::NClob), FieldType::Text);
        assert_eq!(infer_target_type(&SourceType::Date), FieldType::Date);
        assert_eq!(infer_target_type(&SourceType::Boolean), FieldType::Boolean);
    }

    #[test]
    fn test_unknown_defaults_to_text() {
        assert_eq!(infer_target_type(&SourceType::Timestamp), FieldType::Text);
        assert_eq!(
            infer_target_type(&SourceType::Other("geometry".into())),
            FieldType::Text
        );
        assert_eq!(
            infer_target_type(&SourceType::from_jdbc_code(1111)),
            FieldType::Text
        );
    }
}
