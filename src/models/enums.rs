use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(EvidenceType {
    Guideline => "guideline",
    Research => "research",
    Manual => "manual",
});

str_enum!(PlanStatus {
    Active => "active",
    Completed => "completed",
    Discontinued => "discontinued",
});

str_enum!(AuditAction {
    View => "view",
    Create => "create",
    Update => "update",
    Delete => "delete",
});

str_enum!(ResourceType {
    Patient => "patient",
    SessionNote => "session_note",
    TreatmentPlan => "treatment_plan",
});
