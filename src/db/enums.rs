//! Closed enumerations stored as `TEXT` columns.
//!
//! Each enum serializes to the same lowercase name it is stored under, so the
//! API, the database and log lines all agree on spelling.

use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => $text:literal, $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
        #[diesel(sql_type = Text)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Human readable name shown next to the raw value in API responses.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} value: {:?}", stringify!($name), other)),
                }
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                raw.parse().map_err(Into::into)
            }
        }
    };
}

text_enum! {
    Role {
        Admin => "admin", "Administrator";
        Manager => "manager", "Manager";
        Technician => "technician", "Technician";
        Monitor => "monitor", "Monitor";
    }
}

text_enum! {
    Theme {
        Light => "light", "Light";
        Dark => "dark", "Dark";
    }
}

text_enum! {
    ZoneType {
        Building => "building", "Building";
        Outdoor => "outdoor", "Outdoor Area";
        Irrigation => "irrigation", "Irrigation System";
        Other => "other", "Other";
    }
}

text_enum! {
    AlertType {
        Warning => "warning", "Warning";
        Error => "error", "Error";
        Info => "info", "Info";
    }
}

text_enum! {
    /// Alerts only ever move from `Active` to `Resolved`.
    AlertStatus {
        Active => "active", "Active";
        Resolved => "resolved", "Resolved";
    }
}

text_enum! {
    ReportType {
        Monthly => "monthly", "Monthly Usage Report";
        Quarterly => "quarterly", "Quarterly Performance";
        Annual => "annual", "Annual Summary";
        LeakDetection => "leak_detection", "Leak Detection";
        Compliance => "compliance", "Compliance Report";
    }
}

text_enum! {
    ComplianceStatus {
        Pass => "pass", "Pass";
        Warning => "warning", "Warning";
        Fail => "fail", "Fail";
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Monitor
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Light
    }
}

impl Default for ZoneType {
    fn default() -> Self {
        ZoneType::Building
    }
}

impl Role {
    /// Admins and managers may change organization-wide settings.
    pub fn can_manage_settings(self) -> bool {
        match self {
            Role::Admin | Role::Manager => true,
            Role::Technician | Role::Monitor => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_names_parse_back() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(*role));
        }
        for kind in ReportType::ALL {
            assert_eq!(kind.as_str().parse::<ReportType>(), Ok(*kind));
        }
        for status in ComplianceStatus::ALL {
            assert_eq!(status.to_string().parse::<ComplianceStatus>(), Ok(*status));
        }
    }

    #[test]
    fn serde_uses_stored_names() {
        assert_eq!(serde_json::to_value(ReportType::LeakDetection).unwrap(), "leak_detection");
        let zone_type: ZoneType = serde_json::from_str("\"irrigation\"").unwrap();
        assert_eq!(zone_type, ZoneType::Irrigation);
        assert!(serde_json::from_str::<AlertStatus>("\"closed\"").is_err());
    }

    #[test]
    fn unknown_text_is_rejected() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert!(err.contains("Role"));
    }

    #[test]
    fn labels_and_defaults() {
        assert_eq!(Role::default(), Role::Monitor);
        assert_eq!(Theme::default(), Theme::Light);
        assert_eq!(ZoneType::Outdoor.label(), "Outdoor Area");
        assert!(Role::Manager.can_manage_settings());
        assert!(!Role::Technician.can_manage_settings());
    }
}
