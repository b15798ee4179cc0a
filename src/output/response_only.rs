/// Response-Only Output Mode - field values without the host prefix
///
/// List fields are expanded to one value per line so the output can be piped
/// straight into other tools.
use super::FieldSelection;
use super::text::field_values;
use crate::scanner::Record;

pub fn values(record: &Record, fields: &FieldSelection) -> Vec<String> {
    let mut lines: Vec<String> = field_values(record, fields)
        .into_iter()
        .flat_map(|field| field.values)
        .collect();
    if fields.cert
        && let Some(pem) = &record.certificate_pem
    {
        lines.push(pem.trim_end().to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;

    #[test]
    fn test_one_value_per_line() {
        let fields = FieldSelection {
            tls_version: true,
            san: true,
            ..Default::default()
        };
        let lines = values(&success(vec!["a.out.example", "b.out.example"]), &fields);
        assert_eq!(lines, vec!["tls13", "a.out.example", "b.out.example"]);
    }

    #[test]
    fn test_nothing_selected() {
        assert!(values(&success(vec!["a.out.example"]), &FieldSelection::default()).is_empty());
    }
}
