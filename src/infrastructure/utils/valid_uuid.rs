use uuid::Uuid;

use crate::errors::AppError;

/// Parses a path or query id, naming the offending parameter on failure
pub fn valid_uuid(field: &str, id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id.trim()).map_err(|_| AppError::invalid(field, "Invalid id format"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ids_and_names_bad_ones() {
        let id = Uuid::new_v4();
        assert_eq!(valid_uuid("program_id", &format!(" {id} ")).unwrap(), id);

        let err = valid_uuid("program_id", "12").unwrap_err();
        assert!(err.to_string().contains("program_id"));
    }
}
