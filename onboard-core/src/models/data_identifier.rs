//! Data identifiers and collected-data options.
//!
//! A `DataIdentifier` is one atomic attribute in the vault (a first name, an
//! address line). A `CollectedDataOption` is the coarse category a tenant
//! configures on its playbook; each option expands to one or more data
//! identifiers through the `CdoTable`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Atomic attribute key in the data vault.
///
/// Declaration order is meaningful: it is the order attributes appear in
/// resolver output (identity fields, then address, then business).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataIdentifier {
    FirstName,
    MiddleName,
    LastName,
    Email,
    PhoneNumber,
    Dob,
    Ssn4,
    Ssn9,
    Nationality,
    AddressLine1,
    AddressLine2,
    City,
    State,
    Zip,
    Country,
    BusinessName,
    BusinessTin,
    BusinessWebsite,
    BusinessPhoneNumber,
    BusinessAddressLine1,
    BusinessAddressLine2,
    BusinessCity,
    BusinessState,
    BusinessZip,
    BusinessCountry,
}

impl DataIdentifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataIdentifier::FirstName => "id.first_name",
            DataIdentifier::MiddleName => "id.middle_name",
            DataIdentifier::LastName => "id.last_name",
            DataIdentifier::Email => "id.email",
            DataIdentifier::PhoneNumber => "id.phone_number",
            DataIdentifier::Dob => "id.dob",
            DataIdentifier::Ssn4 => "id.ssn4",
            DataIdentifier::Ssn9 => "id.ssn9",
            DataIdentifier::Nationality => "id.nationality",
            DataIdentifier::AddressLine1 => "id.address_line1",
            DataIdentifier::AddressLine2 => "id.address_line2",
            DataIdentifier::City => "id.city",
            DataIdentifier::State => "id.state",
            DataIdentifier::Zip => "id.zip",
            DataIdentifier::Country => "id.country",
            DataIdentifier::BusinessName => "business.name",
            DataIdentifier::BusinessTin => "business.tin",
            DataIdentifier::BusinessWebsite => "business.website",
            DataIdentifier::BusinessPhoneNumber => "business.phone_number",
            DataIdentifier::BusinessAddressLine1 => "business.address_line1",
            DataIdentifier::BusinessAddressLine2 => "business.address_line2",
            DataIdentifier::BusinessCity => "business.city",
            DataIdentifier::BusinessState => "business.state",
            DataIdentifier::BusinessZip => "business.zip",
            DataIdentifier::BusinessCountry => "business.country",
        }
    }
}

impl std::fmt::Display for DataIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse, tenant-configured data category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectedDataOption {
    /// Legal name plus contact email.
    Basic,
    Dob,
    Ssn4,
    Ssn9,
    PhoneNumber,
    Nationality,
    FullAddress,
    BusinessName,
    BusinessTin,
    BusinessWebsite,
    BusinessPhoneNumber,
    BusinessAddress,
}

impl CollectedDataOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectedDataOption::Basic => "basic",
            CollectedDataOption::Dob => "dob",
            CollectedDataOption::Ssn4 => "ssn4",
            CollectedDataOption::Ssn9 => "ssn9",
            CollectedDataOption::PhoneNumber => "phone_number",
            CollectedDataOption::Nationality => "nationality",
            CollectedDataOption::FullAddress => "full_address",
            CollectedDataOption::BusinessName => "business_name",
            CollectedDataOption::BusinessTin => "business_tin",
            CollectedDataOption::BusinessWebsite => "business_website",
            CollectedDataOption::BusinessPhoneNumber => "business_phone_number",
            CollectedDataOption::BusinessAddress => "business_address",
        }
    }

    /// Whether this option belongs to the business (KYB) side of a playbook.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            CollectedDataOption::BusinessName
                | CollectedDataOption::BusinessTin
                | CollectedDataOption::BusinessWebsite
                | CollectedDataOption::BusinessPhoneNumber
                | CollectedDataOption::BusinessAddress
        )
    }
}

impl std::fmt::Display for CollectedDataOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable expansion table from collected-data options to data identifiers.
///
/// Built once and passed by reference into the resolver; never mutated after
/// construction.
#[derive(Debug, Clone)]
pub struct CdoTable {
    expansions: BTreeMap<CollectedDataOption, Vec<DataIdentifier>>,
}

impl CdoTable {
    /// The standard expansion used in production.
    pub fn standard() -> Self {
        use CollectedDataOption as Cdo;
        use DataIdentifier as Di;

        let mut expansions = BTreeMap::new();
        expansions.insert(Cdo::Basic, vec![Di::FirstName, Di::LastName, Di::Email]);
        expansions.insert(Cdo::Dob, vec![Di::Dob]);
        expansions.insert(Cdo::Ssn4, vec![Di::Ssn4]);
        expansions.insert(Cdo::Ssn9, vec![Di::Ssn9]);
        expansions.insert(Cdo::PhoneNumber, vec![Di::PhoneNumber]);
        expansions.insert(Cdo::Nationality, vec![Di::Nationality]);
        expansions.insert(
            Cdo::FullAddress,
            vec![
                Di::AddressLine1,
                Di::AddressLine2,
                Di::City,
                Di::State,
                Di::Zip,
                Di::Country,
            ],
        );
        expansions.insert(Cdo::BusinessName, vec![Di::BusinessName]);
        expansions.insert(Cdo::BusinessTin, vec![Di::BusinessTin]);
        expansions.insert(Cdo::BusinessWebsite, vec![Di::BusinessWebsite]);
        expansions.insert(Cdo::BusinessPhoneNumber, vec![Di::BusinessPhoneNumber]);
        expansions.insert(
            Cdo::BusinessAddress,
            vec![
                Di::BusinessAddressLine1,
                Di::BusinessAddressLine2,
                Di::BusinessCity,
                Di::BusinessState,
                Di::BusinessZip,
                Di::BusinessCountry,
            ],
        );

        Self { expansions }
    }

    /// Full set of data identifiers the option expands to.
    pub fn expand(&self, option: CollectedDataOption) -> &[DataIdentifier] {
        self.expansions
            .get(&option)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
