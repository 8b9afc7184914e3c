use anyhow::{Context, Result};

use crate::config::OutputFormat;
use crate::core::Triplet;

pub struct TripletSerializer;

impl TripletSerializer {
    pub fn new() -> Self {
        Self
    }

    pub fn serialize(&self, triplets: &[Triplet], format: &OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => self.serialize_json(triplets),
            OutputFormat::JsonLines => self.serialize_json_lines(triplets),
            OutputFormat::Csv => self.serialize_csv(triplets),
        }
    }

    fn serialize_json(&self, triplets: &[Triplet]) -> Result<String> {
        serde_json::to_string_pretty(triplets).context("Failed to serialize triplets as JSON")
    }

    fn serialize_json_lines(&self, triplets: &[Triplet]) -> Result<String> {
        let mut output = String::new();
        for triplet in triplets {
            output.push_str(
                &serde_json::to_string(triplet)
                    .context("Failed to serialize triplet as JSON line")?,
            );
            output.push('\n');
        }
        Ok(output)
    }

    fn serialize_csv(&self, triplets: &[Triplet]) -> Result<String> {
        let mut output = String::from(
            "subject,subject_id,subject_type,predicate,predicate_id,object,object_id,object_type\n",
        );

        for triplet in triplets {
            let fields = [
                &triplet.subject,
                &triplet.subject_id,
                &triplet.subject_type,
                &triplet.predicate,
                &triplet.predicate_id,
                &triplet.object,
                &triplet.object_id,
                &triplet.object_type,
            ];
            let row: Vec<String> = fields.iter().map(|f| escape_csv_field(f)).collect();
            output.push_str(&row.join(","));
            output.push('\n');
        }

        Ok(output)
    }
}

impl Default for TripletSerializer {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Report invariant violations in a triplet list as human-readable issues.
pub fn validate_triplets(triplets: &[Triplet]) -> Vec<String> {
    let mut issues = Vec::new();

    for (i, triplet) in triplets.iter().enumerate() {
        if triplet.subject_id.is_empty() {
            issues.push(format!("Triplet {}: Empty subject id", i));
        }
        if triplet.object_id.is_empty() {
            issues.push(format!("Triplet {}: Empty object id", i));
        }
        if !triplet.subject_id.is_empty() && triplet.subject_id == triplet.object_id {
            issues.push(format!(
                "Triplet {}: Subject and object share id {}",
                i, triplet.subject_id
            ));
        }
        if triplet.predicate_id.is_empty() {
            issues.push(format!("Triplet {}: Empty predicate id", i));
        }
        if triplet.predicate.is_empty() {
            issues.push(format!("Triplet {}: Empty predicate label", i));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turing_triplet() -> Triplet {
        Triplet {
            subject: "Alan Turing".to_string(),
            subject_id: "Q7251".to_string(),
            subject_type: "human".to_string(),
            predicate: "citizenship".to_string(),
            predicate_id: "P27".to_string(),
            object: "United Kingdom".to_string(),
            object_id: "Q145".to_string(),
            object_type: "country".to_string(),
        }
    }

    #[test]
    fn test_serialize_json_round_trips() {
        let serializer = TripletSerializer::new();
        let output = serializer
            .serialize(&[turing_triplet()], &OutputFormat::Json)
            .unwrap();

        let parsed: Vec<Triplet> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed, vec![turing_triplet()]);
    }

    #[test]
    fn test_serialize_json_lines_one_record_per_line() {
        let serializer = TripletSerializer::new();
        let output = serializer
            .serialize(
                &[turing_triplet(), turing_triplet()],
                &OutputFormat::JsonLines,
            )
            .unwrap();

        let lines: Vec<_> = output.trim_end().lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Triplet = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.predicate_id, "P27");
    }

    #[test]
    fn test_serialize_csv_escapes_commas_and_quotes() {
        let mut triplet = turing_triplet();
        triplet.object = "United Kingdom, of Great Britain \"and\" Northern Ireland".to_string();

        let serializer = TripletSerializer::new();
        let output = serializer.serialize(&[triplet], &OutputFormat::Csv).unwrap();

        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("subject,subject_id"));
        assert!(lines[1].contains("\"United Kingdom, of Great Britain \"\"and\"\" Northern Ireland\""));
    }

    #[test]
    fn test_validate_triplets_flags_shared_and_empty_ids() {
        let mut bad = turing_triplet();
        bad.object_id = "Q7251".to_string();
        let mut empty = turing_triplet();
        empty.subject_id = String::new();

        let issues = validate_triplets(&[turing_triplet(), bad, empty]);
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("share id"));
        assert!(issues[1].contains("Empty subject id"));
    }
}
