//! Built-in extractors and validators.
//!
//! | name              | kind      |
//! |-------------------|-----------|
//! | `text_length`     | extractor |
//! | `doc_type`        | extractor |
//! | `mrz_parser`      | extractor |
//! | `mrz_*`           | extractor |
//! | `is_invoice`      | validator |
//! | `non_empty`       | validator |
//! | `nip`             | validator |
//! | `regon`           | validator |
//! | `iban`            | validator |
//! | `date`            | validator |
//! | `amount`          | validator |
//! | `mrz_check_digit` | validator |

pub mod extractors;
pub mod mrz;
pub mod patterns;
pub mod validators;

use crate::error::RegistryError;
use crate::registry::RegistryBuilder;

use extractors::{classify_document, text_length};
use mrz::{MrzField, MrzFieldExtractor};
use validators::Predicate;

/// Register every built-in extractor and validator.
pub fn register_builtins(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    builder
        .register_extractor("text_length", text_length)?
        .register_extractor("doc_type", classify_document)?;

    for field in MrzField::ALL {
        builder.register_extractor(field.extractor_name(), MrzFieldExtractor(field))?;
    }

    builder
        .register_validator("is_invoice", Predicate(validators::is_invoice))?
        .register_validator("non_empty", Predicate(validators::non_empty))?
        .register_validator("nip", Predicate(validators::validate_nip))?
        .register_validator("regon", Predicate(validators::validate_regon))?
        .register_validator("iban", Predicate(validators::validate_iban))?
        .register_validator("date", Predicate(validators::is_date))?
        .register_validator("amount", Predicate(validators::is_amount))?
        .register_validator("mrz_check_digit", Predicate(validators::has_mrz_check_digit))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_register_builtins() {
        let mut builder = Registry::builder();
        register_builtins(&mut builder).unwrap();
        let registry = builder.build();

        assert_eq!(registry.extractor_names().count(), 10);
        assert_eq!(registry.validator_names().count(), 8);
        assert!(registry.extractor("mrz_parser").is_ok());
        assert!(registry.validator("iban").is_ok());
    }

    #[test]
    fn test_register_builtins_twice_fails() {
        let mut builder = Registry::builder();
        register_builtins(&mut builder).unwrap();
        assert_eq!(
            register_builtins(&mut builder),
            Err(RegistryError::DuplicateExtractor("text_length".to_string()))
        );
    }
}
