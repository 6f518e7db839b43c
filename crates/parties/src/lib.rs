//! Parties: the doctor and supplier registries.

pub mod party;

pub use party::{
    ContactInfo, Party, PartyCommand, PartyEvent, PartyId, PartyKind, PartyReactivated,
    PartyRegistered, PartyStatus, PartySuspended, PartyUpdated, ReactivateParty, RegisterParty,
    SuspendParty, UpdateDetails,
};
