use crate::config::{
    MAX_DETAILS_LENGTH, MAX_IDENTITY_LENGTH, MAX_NAME_LENGTH, MAX_SECURITY_CONTACT_LENGTH,
    MAX_WEBSITE_LENGTH,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptionError {
    #[error("description {field} is {len} characters, maximum: {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

/// Human readable metadata attached to a validator or map3 node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Description {
    pub name: String,
    pub identity: String,
    pub website: String,
    pub security_contact: String,
    pub details: String,
}

impl Description {
    pub fn validate(&self) -> Result<(), DescriptionError> {
        let fields = [
            ("name", &self.name, MAX_NAME_LENGTH),
            ("identity", &self.identity, MAX_IDENTITY_LENGTH),
            ("website", &self.website, MAX_WEBSITE_LENGTH),
            ("security_contact", &self.security_contact, MAX_SECURITY_CONTACT_LENGTH),
            ("details", &self.details, MAX_DETAILS_LENGTH),
        ];

        for (field, value, max) in fields {
            let len = value.chars().count();
            if len > max {
                return Err(DescriptionError::TooLong { field, len, max });
            }
        }

        Ok(())
    }

    // Fields left empty in `update` keep their current value, as the chain does for edits
    pub fn merged_with(&self, update: &Description) -> Description {
        let pick = |new: &String, old: &String| {
            if new.is_empty() {
                old.clone()
            } else {
                new.clone()
            }
        };

        Description {
            name: pick(&update.name, &self.name),
            identity: pick(&update.identity, &self.identity),
            website: pick(&update.website, &self.website),
            security_contact: pick(&update.security_contact, &self.security_contact),
            details: pick(&update.details, &self.details),
        }
    }
}
