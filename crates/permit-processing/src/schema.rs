//! Catalogue of the building-permit columns.
//!
//! The loader does not enforce this schema: unknown columns pass through and
//! known ones may be absent. The catalogue supplies descriptions for the
//! dashboard and the defaults for date and outlier columns.

use serde::Serialize;

/// Broad role a column plays in a permit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnGroup {
    Identifier,
    Status,
    Date,
    Location,
    Building,
    Financial,
    Flag,
    Text,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PermitColumn {
    pub name: &'static str,
    pub description: &'static str,
    pub group: ColumnGroup,
}

const fn col(name: &'static str, group: ColumnGroup, description: &'static str) -> PermitColumn {
    PermitColumn {
        name,
        description,
        group,
    }
}

use ColumnGroup::*;

pub const PERMIT_COLUMNS: [PermitColumn; 43] = [
    col("Permit Number", Identifier, "Unique identifier/tracking number for each building permit"),
    col("Permit Type", Status, "Type/category of the permit issued"),
    col("Permit Type Definition", Status, "Detailed definition explaining the permit type"),
    col("Permit Creation Date", Date, "Date when the permit was first created/submitted"),
    col("Block", Location, "City block number where the project is located"),
    col("Lot", Location, "Lot number within the block"),
    col("Street Number", Location, "Street address number"),
    col("Street Number Suffix", Location, "Suffix for the street number when present"),
    col("Street Name", Location, "Name of the street where the project is located"),
    col("Street Suffix", Location, "Street suffix (St, Ave, Blvd, etc.)"),
    col("Unit", Location, "Unit or apartment number"),
    col("Unit Suffix", Location, "Suffix for unit when present"),
    col("Description", Text, "Description of the work/project the permit is for"),
    col("Current Status", Status, "Current permit status (issued, complete, withdrawn, etc.)"),
    col("Current Status Date", Date, "Date when current status was recorded"),
    col("Filed Date", Date, "Date the permit was filed"),
    col("Issued Date", Date, "Date the permit was issued"),
    col("Completed Date", Date, "Date the permit's work was marked completed"),
    col("First Construction Document Date", Date, "Date of the first construction document submission"),
    col("Structural Notification", Flag, "Indicates if structural notification was required"),
    col("Number of Existing Stories", Building, "Existing building stories"),
    col("Number of Proposed Stories", Building, "Proposed number of stories"),
    col("Voluntary Soft-Story Retrofit", Flag, "Flag for voluntary retrofit"),
    col("Fire Only Permit", Flag, "Flag when the permit is fire-only"),
    col("Permit Expiration Date", Date, "Expiration date for the permit"),
    col("Estimated Cost", Financial, "Estimated cost of the project (USD)"),
    col("Revised Cost", Financial, "Revised/actual cost (USD)"),
    col("Existing Use", Building, "Existing use (e.g., 1 family dwelling)"),
    col("Existing Units", Building, "Number of existing units"),
    col("Proposed Use", Building, "Proposed use after work"),
    col("Proposed Units", Building, "Number of proposed units"),
    col("Plansets", Building, "Number of plan sets submitted"),
    col("TIDF Compliance", Flag, "Transit impact fee compliance flag"),
    col("Existing Construction Type", Building, "Code for existing construction type"),
    col("Existing Construction Type Description", Building, "Description of existing construction type"),
    col("Proposed Construction Type", Building, "Code for proposed construction type"),
    col("Proposed Construction Type Description", Building, "Description of proposed construction type"),
    col("Site Permit", Flag, "Flag indicating site permit"),
    col("Supervisor District", Location, "Supervisor district number"),
    col("Neighborhoods - Analysis Boundaries", Location, "Neighborhood name used for analysis"),
    col("Zipcode", Location, "ZIP code of the property"),
    col("Location", Location, "Latitude/longitude coordinates string"),
    col("Record ID", Identifier, "Internal record identifier"),
];

pub const DEFAULT_DATE_COLUMNS: [&str; 7] = [
    "Permit Creation Date",
    "Current Status Date",
    "Filed Date",
    "Issued Date",
    "Completed Date",
    "First Construction Document Date",
    "Permit Expiration Date",
];

pub const DEFAULT_OUTLIER_COLUMNS: [&str; 2] = ["Estimated Cost", "Revised Cost"];

/// Columns checked for repeated identifiers.
pub const KEY_COLUMNS: [&str; 2] = ["Permit Number", "Record ID"];

pub const STATUS_COLUMN: &str = "Current Status";
pub const NEIGHBORHOOD_COLUMN: &str = "Neighborhoods - Analysis Boundaries";
pub const CREATION_DATE_COLUMN: &str = "Permit Creation Date";

/// Columns shown in the overview preview when present.
pub const PREVIEW_COLUMNS: [&str; 6] = [
    "Permit Number",
    "Permit Type",
    "Current Status",
    "Street Name",
    NEIGHBORHOOD_COLUMN,
    "Estimated Cost",
];

pub fn lookup(name: &str) -> Option<&'static PermitColumn> {
    PERMIT_COLUMNS.iter().find(|c| c.name == name)
}

pub fn describe(name: &str) -> Option<&'static str> {
    lookup(name).map(|c| c.description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_names_are_unique() {
        let mut names: Vec<&str> = PERMIT_COLUMNS.iter().map(|c| c.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), PERMIT_COLUMNS.len());
    }

    #[test]
    fn test_default_date_columns_are_catalogued_as_dates() {
        for name in DEFAULT_DATE_COLUMNS {
            assert_eq!(lookup(name).map(|c| c.group), Some(ColumnGroup::Date), "{name}");
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe("Zipcode"), Some("ZIP code of the property"));
        assert_eq!(describe("Not A Column"), None);
    }
}
