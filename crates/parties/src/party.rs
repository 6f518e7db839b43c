use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dentflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use dentflow_events::Event;

/// Party identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub AggregateId);

impl PartyId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PartyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Party kind: referring doctor or material supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Doctor,
    Supplier,
}

/// Party status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Active,
    Suspended,
}

/// Contact information. `clinic_name` is meaningful for doctors only,
/// `tax_number` for suppliers only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub clinic_name: Option<String>,
    pub tax_number: Option<String>,
}

/// Aggregate root: Party (doctor or supplier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    id: PartyId,
    tenant_id: Option<TenantId>,
    kind: PartyKind,
    name: String,
    contact: ContactInfo,
    status: PartyStatus,
    version: u64,
    created: bool,
}

impl Party {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PartyId) -> Self {
        Self {
            id,
            tenant_id: None,
            kind: PartyKind::Doctor,
            name: String::new(),
            contact: ContactInfo::default(),
            status: PartyStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PartyId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn kind(&self) -> PartyKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn status(&self) -> PartyStatus {
        self.status
    }

    /// Suspended parties cannot take new cases or purchase orders.
    pub fn can_transact(&self) -> bool {
        self.status == PartyStatus::Active
    }
}

impl AggregateRoot for Party {
    type Id = PartyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterParty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterParty {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDetails. `None` fields keep existing values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SuspendParty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendParty {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReactivateParty. Lifts a suspension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateParty {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyCommand {
    RegisterParty(RegisterParty),
    UpdateDetails(UpdateDetails),
    SuspendParty(SuspendParty),
    ReactivateParty(ReactivateParty),
}

/// Event: PartyRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRegistered {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartyUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyUpdated {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartySuspended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySuspended {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartyReactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyReactivated {
    pub tenant_id: TenantId,
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyEvent {
    PartyRegistered(PartyRegistered),
    PartyUpdated(PartyUpdated),
    PartySuspended(PartySuspended),
    PartyReactivated(PartyReactivated),
}

impl Event for PartyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartyEvent::PartyRegistered(_) => "parties.party.registered",
            PartyEvent::PartyUpdated(_) => "parties.party.updated",
            PartyEvent::PartySuspended(_) => "parties.party.suspended",
            PartyEvent::PartyReactivated(_) => "parties.party.reactivated",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PartyEvent::PartyRegistered(e) => e.occurred_at,
            PartyEvent::PartyUpdated(e) => e.occurred_at,
            PartyEvent::PartySuspended(e) => e.occurred_at,
            PartyEvent::PartyReactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Party {
    type Command = PartyCommand;
    type Event = PartyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartyEvent::PartyRegistered(e) => {
                self.id = e.party_id;
                self.tenant_id = Some(e.tenant_id);
                self.kind = e.kind;
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.status = PartyStatus::Active;
                self.created = true;
            }
            PartyEvent::PartyUpdated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
            }
            PartyEvent::PartySuspended(_) => {
                self.status = PartyStatus::Suspended;
            }
            PartyEvent::PartyReactivated(_) => {
                self.status = PartyStatus::Active;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PartyCommand::RegisterParty(cmd) => self.handle_register(cmd),
            PartyCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            PartyCommand::SuspendParty(cmd) => self.handle_suspend(cmd),
            PartyCommand::ReactivateParty(cmd) => self.handle_reactivate(cmd),
        }
    }
}

impl Party {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_party_id(&self, party_id: PartyId) -> Result<(), DomainError> {
        if self.id != party_id {
            return Err(DomainError::invariant("party_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterParty) -> Result<Vec<PartyEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("party already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let contact = cmd.contact.clone().unwrap_or_default();

        Ok(vec![PartyEvent::PartyRegistered(PartyRegistered {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            kind: cmd.kind,
            name: cmd.name.clone(),
            contact,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDetails) -> Result<Vec<PartyEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_party_id(cmd.party_id)?;

        let new_name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if new_name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let new_contact = cmd.contact.clone().unwrap_or_else(|| self.contact.clone());

        Ok(vec![PartyEvent::PartyUpdated(PartyUpdated {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            name: new_name,
            contact: new_contact,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendParty) -> Result<Vec<PartyEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_party_id(cmd.party_id)?;

        if self.status == PartyStatus::Suspended {
            return Err(DomainError::conflict("party is already suspended"));
        }

        Ok(vec![PartyEvent::PartySuspended(PartySuspended {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &ReactivateParty) -> Result<Vec<PartyEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_party_id(cmd.party_id)?;

        if self.status == PartyStatus::Active {
            return Err(DomainError::conflict("party is already active"));
        }

        Ok(vec![PartyEvent::PartyReactivated(PartyReactivated {
            tenant_id: cmd.tenant_id,
            party_id: cmd.party_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_party_id() -> PartyId {
        PartyId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn registered(kind: PartyKind, tenant_id: TenantId, party_id: PartyId) -> Party {
        let mut party = Party::empty(party_id);
        let cmd = RegisterParty {
            tenant_id,
            party_id,
            kind,
            name: "Dr. Ahmed Hassan".to_string(),
            contact: None,
            occurred_at: test_time(),
        };
        let events = party.handle(&PartyCommand::RegisterParty(cmd)).unwrap();
        party.apply(&events[0]);
        party
    }

    #[test]
    fn register_doctor_emits_registered_event() {
        let party = Party::empty(test_party_id());
        let tenant_id = test_tenant_id();
        let party_id = test_party_id();
        let contact = ContactInfo {
            phone: Some("+201001234567".to_string()),
            email: Some("clinic@example.com".to_string()),
            clinic_name: Some("Smile Clinic".to_string()),
            ..ContactInfo::default()
        };
        let cmd = RegisterParty {
            tenant_id,
            party_id,
            kind: PartyKind::Doctor,
            name: "Dr. Ahmed Hassan".to_string(),
            contact: Some(contact.clone()),
            occurred_at: test_time(),
        };

        let events = party.handle(&PartyCommand::RegisterParty(cmd)).unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            PartyEvent::PartyRegistered(e) => {
                assert_eq!(e.tenant_id, tenant_id);
                assert_eq!(e.party_id, party_id);
                assert_eq!(e.kind, PartyKind::Doctor);
                assert_eq!(e.contact, contact);
            }
            _ => panic!("Expected PartyRegistered event"),
        }
    }

    #[test]
    fn register_rejects_empty_name() {
        let party = Party::empty(test_party_id());
        let cmd = RegisterParty {
            tenant_id: test_tenant_id(),
            party_id: test_party_id(),
            kind: PartyKind::Supplier,
            name: "   ".to_string(),
            contact: None,
            occurred_at: test_time(),
        };

        let err = party.handle(&PartyCommand::RegisterParty(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn register_rejects_duplicate_creation() {
        let tenant_id = test_tenant_id();
        let party_id = test_party_id();
        let party = registered(PartyKind::Doctor, tenant_id, party_id);

        let cmd = RegisterParty {
            tenant_id,
            party_id,
            kind: PartyKind::Doctor,
            name: "Dr. Ahmed Hassan".to_string(),
            contact: None,
            occurred_at: test_time(),
        };
        let err = party.handle(&PartyCommand::RegisterParty(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn update_details_replaces_name_and_contact() {
        let tenant_id = test_tenant_id();
        let party_id = test_party_id();
        let mut party = registered(PartyKind::Supplier, tenant_id, party_id);

        let new_contact = ContactInfo {
            phone: Some("+201009876543".to_string()),
            address: Some("12 El Tahrir St, Cairo".to_string()),
            tax_number: Some("EG-204-881".to_string()),
            ..ContactInfo::default()
        };
        let cmd = UpdateDetails {
            tenant_id,
            party_id,
            name: Some("Nile Dental Supplies".to_string()),
            contact: Some(new_contact.clone()),
            occurred_at: test_time(),
        };

        let events = party.handle(&PartyCommand::UpdateDetails(cmd)).unwrap();
        party.apply(&events[0]);

        assert_eq!(party.name(), "Nile Dental Supplies");
        assert_eq!(party.contact(), &new_contact);
    }

    #[test]
    fn suspend_prevents_transacting_and_rejects_repeat() {
        let tenant_id = test_tenant_id();
        let party_id = test_party_id();
        let mut party = registered(PartyKind::Doctor, tenant_id, party_id);
        assert!(party.can_transact());

        let cmd = SuspendParty {
            tenant_id,
            party_id,
            reason: Some("Unsettled balance".to_string()),
            occurred_at: test_time(),
        };
        let events = party.handle(&PartyCommand::SuspendParty(cmd.clone())).unwrap();
        party.apply(&events[0]);

        assert_eq!(party.status(), PartyStatus::Suspended);
        assert!(!party.can_transact());

        let err = party.handle(&PartyCommand::SuspendParty(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn reactivate_lifts_a_suspension_and_rejects_active_parties() {
        let tenant_id = test_tenant_id();
        let party_id = test_party_id();
        let mut party = registered(PartyKind::Supplier, tenant_id, party_id);

        let reactivate = ReactivateParty {
            tenant_id,
            party_id,
            occurred_at: test_time(),
        };
        let err = party
            .handle(&PartyCommand::ReactivateParty(reactivate.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let suspend = SuspendParty {
            tenant_id,
            party_id,
            reason: None,
            occurred_at: test_time(),
        };
        let events = party.handle(&PartyCommand::SuspendParty(suspend)).unwrap();
        party.apply(&events[0]);
        assert!(!party.can_transact());

        let events = party
            .handle(&PartyCommand::ReactivateParty(reactivate))
            .unwrap();
        party.apply(&events[0]);
        assert_eq!(party.status(), PartyStatus::Active);
        assert!(party.can_transact());
    }

    #[test]
    fn suspend_rejects_non_existent_party() {
        let party = Party::empty(test_party_id());
        let cmd = SuspendParty {
            tenant_id: test_tenant_id(),
            party_id: test_party_id(),
            reason: None,
            occurred_at: test_time(),
        };

        let err = party.handle(&PartyCommand::SuspendParty(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn version_increments_on_apply() {
        let tenant_id = test_tenant_id();
        let party_id = test_party_id();
        let mut party = registered(PartyKind::Doctor, tenant_id, party_id);
        assert_eq!(party.version(), 1);

        let cmd = SuspendParty {
            tenant_id,
            party_id,
            reason: None,
            occurred_at: test_time(),
        };
        let events = party.handle(&PartyCommand::SuspendParty(cmd)).unwrap();
        party.apply(&events[0]);
        assert_eq!(party.version(), 2);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let tenant_id = test_tenant_id();
        let party_id = test_party_id();
        let party = registered(PartyKind::Supplier, tenant_id, party_id);
        let version_before = party.version();

        let cmd = SuspendParty {
            tenant_id,
            party_id,
            reason: None,
            occurred_at: test_time(),
        };
        let events1 = party.handle(&PartyCommand::SuspendParty(cmd.clone())).unwrap();
        let events2 = party.handle(&PartyCommand::SuspendParty(cmd)).unwrap();

        assert_eq!(party.version(), version_before);
        assert_eq!(party.status(), PartyStatus::Active);
        assert_eq!(events1, events2);
    }
}
