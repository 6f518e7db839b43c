use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dentflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use dentflow_events::Event;
use dentflow_parties::PartyId;
use dentflow_pricing::{Priority, WorkType};

use crate::workflow::{CASE_WORKFLOW, CaseStatus, Department, department_of};

/// Case identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub AggregateId);

impl CaseId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CaseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Quality-control verdict recorded by the QC subsystem.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QcResult {
    Pass,
    Fail,
}

/// One recorded transition in a case's audit trail.
///
/// Append-only; this is the only place the "why" of a transition lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub from_status: CaseStatus,
    pub to_status: CaseStatus,
    pub department: Department,
    pub occurred_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
}

/// Aggregate root: production Case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    id: CaseId,
    tenant_id: Option<TenantId>,
    case_number: String,
    doctor_id: Option<PartyId>,
    work_type: WorkType,
    teeth: String,
    priority: Priority,
    status: CaseStatus,
    qc_result: Option<QcResult>,
    invoice_id: Option<AggregateId>,
    history: Vec<WorkflowStep>,
    version: u64,
    created: bool,
}

impl Case {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: CaseId) -> Self {
        Self {
            id,
            tenant_id: None,
            case_number: String::new(),
            doctor_id: None,
            work_type: WorkType::Crown,
            teeth: String::new(),
            priority: Priority::Normal,
            status: CaseStatus::Reception,
            qc_result: None,
            invoice_id: None,
            history: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CaseId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn case_number(&self) -> &str {
        &self.case_number
    }

    pub fn doctor_id(&self) -> Option<PartyId> {
        self.doctor_id
    }

    pub fn work_type(&self) -> WorkType {
        self.work_type
    }

    pub fn teeth(&self) -> &str {
        &self.teeth
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn status(&self) -> CaseStatus {
        self.status
    }

    /// Department responsible for the case right now (derived from status).
    pub fn department(&self) -> Department {
        department_of(self.status)
    }

    pub fn qc_result(&self) -> Option<QcResult> {
        self.qc_result
    }

    pub fn invoice_id(&self) -> Option<AggregateId> {
        self.invoice_id
    }

    pub fn history(&self) -> &[WorkflowStep] {
        &self.history
    }

    /// QC gate: a case is invoiceable once QC passed and no invoice is linked.
    pub fn is_invoiceable(&self) -> bool {
        self.qc_result == Some(QcResult::Pass) && self.invoice_id.is_none()
    }
}

impl AggregateRoot for Case {
    type Id = CaseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterCase (intake).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCase {
    pub tenant_id: TenantId,
    pub case_id: CaseId,
    pub case_number: String,
    pub doctor_id: PartyId,
    pub work_type: WorkType,
    pub teeth: String,
    pub priority: Priority,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Transfer the case to another status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub tenant_id: TenantId,
    pub case_id: CaseId,
    pub to_status: CaseStatus,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordQc (verdict supplied by the QC subsystem).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQc {
    pub tenant_id: TenantId,
    pub case_id: CaseId,
    pub result: QcResult,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LinkInvoice (the QC gate + one-invoice-per-case chokepoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInvoice {
    pub tenant_id: TenantId,
    pub case_id: CaseId,
    pub invoice_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UnlinkInvoice (invoice cancelled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlinkInvoice {
    pub tenant_id: TenantId,
    pub case_id: CaseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseCommand {
    RegisterCase(RegisterCase),
    Transfer(Transfer),
    RecordQc(RecordQc),
    LinkInvoice(LinkInvoice),
    UnlinkInvoice(UnlinkInvoice),
}

/// Event: CaseRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRegistered {
    pub tenant_id: TenantId,
    pub case_id: CaseId,
    pub case_number: String,
    pub doctor_id: PartyId,
    pub work_type: WorkType,
    pub teeth: String,
    pub priority: Priority,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CaseTransferred (one audit-trail step).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseTransferred {
    pub tenant_id: TenantId,
    pub case_id: CaseId,
    pub from_status: CaseStatus,
    pub to_status: CaseStatus,
    pub department: Department,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QcRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcRecorded {
    pub tenant_id: TenantId,
    pub case_id: CaseId,
    pub result: QcResult,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceLinked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLinked {
    pub tenant_id: TenantId,
    pub case_id: CaseId,
    pub invoice_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceUnlinked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceUnlinked {
    pub tenant_id: TenantId,
    pub case_id: CaseId,
    pub invoice_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseEvent {
    CaseRegistered(CaseRegistered),
    CaseTransferred(CaseTransferred),
    QcRecorded(QcRecorded),
    InvoiceLinked(InvoiceLinked),
    InvoiceUnlinked(InvoiceUnlinked),
}

impl Event for CaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CaseEvent::CaseRegistered(_) => "cases.case.registered",
            CaseEvent::CaseTransferred(_) => "cases.case.transferred",
            CaseEvent::QcRecorded(_) => "cases.case.qc_recorded",
            CaseEvent::InvoiceLinked(_) => "cases.case.invoice_linked",
            CaseEvent::InvoiceUnlinked(_) => "cases.case.invoice_unlinked",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CaseEvent::CaseRegistered(e) => e.occurred_at,
            CaseEvent::CaseTransferred(e) => e.occurred_at,
            CaseEvent::QcRecorded(e) => e.occurred_at,
            CaseEvent::InvoiceLinked(e) => e.occurred_at,
            CaseEvent::InvoiceUnlinked(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Case {
    type Command = CaseCommand;
    type Event = CaseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CaseEvent::CaseRegistered(e) => {
                self.id = e.case_id;
                self.tenant_id = Some(e.tenant_id);
                self.case_number = e.case_number.clone();
                self.doctor_id = Some(e.doctor_id);
                self.work_type = e.work_type;
                self.teeth = e.teeth.clone();
                self.priority = e.priority;
                self.status = CaseStatus::Reception;
                self.qc_result = None;
                self.invoice_id = None;
                self.history.clear();
                self.created = true;
            }
            CaseEvent::CaseTransferred(e) => {
                self.status = e.to_status;
                self.history.push(WorkflowStep {
                    from_status: e.from_status,
                    to_status: e.to_status,
                    department: e.department,
                    occurred_at: e.occurred_at,
                    notes: e.notes.clone(),
                    rejection_reason: e.rejection_reason.clone(),
                });
            }
            CaseEvent::QcRecorded(e) => {
                self.qc_result = Some(e.result);
            }
            CaseEvent::InvoiceLinked(e) => {
                self.invoice_id = Some(e.invoice_id);
            }
            CaseEvent::InvoiceUnlinked(_) => {
                self.invoice_id = None;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CaseCommand::RegisterCase(cmd) => self.handle_register(cmd),
            CaseCommand::Transfer(cmd) => self.handle_transfer(cmd),
            CaseCommand::RecordQc(cmd) => self.handle_record_qc(cmd),
            CaseCommand::LinkInvoice(cmd) => self.handle_link_invoice(cmd),
            CaseCommand::UnlinkInvoice(cmd) => self.handle_unlink_invoice(cmd),
        }
    }
}

impl Case {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_case_id(&self, case_id: CaseId) -> Result<(), DomainError> {
        if self.id != case_id {
            return Err(DomainError::invariant("case_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterCase) -> Result<Vec<CaseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("case already exists"));
        }
        if cmd.case_number.is_empty() {
            return Err(DomainError::validation("case_number must not be empty"));
        }
        if cmd.teeth.trim().is_empty() {
            return Err(DomainError::validation("teeth specification must not be empty"));
        }

        Ok(vec![CaseEvent::CaseRegistered(CaseRegistered {
            tenant_id: cmd.tenant_id,
            case_id: cmd.case_id,
            case_number: cmd.case_number.clone(),
            doctor_id: cmd.doctor_id,
            work_type: cmd.work_type,
            teeth: cmd.teeth.clone(),
            priority: cmd.priority,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transfer(&self, cmd: &Transfer) -> Result<Vec<CaseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_case_id(cmd.case_id)?;

        CASE_WORKFLOW.check(self.status, cmd.to_status)?;

        // The billing stage is gated on a passing QC verdict.
        if cmd.to_status == CaseStatus::Accounting && self.qc_result != Some(QcResult::Pass) {
            return Err(DomainError::precondition(
                "cannot enter accounting before QC has passed",
            ));
        }

        Ok(vec![CaseEvent::CaseTransferred(CaseTransferred {
            tenant_id: cmd.tenant_id,
            case_id: cmd.case_id,
            from_status: self.status,
            to_status: cmd.to_status,
            department: department_of(cmd.to_status),
            notes: cmd.notes.clone(),
            rejection_reason: cmd.rejection_reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_qc(&self, cmd: &RecordQc) -> Result<Vec<CaseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_case_id(cmd.case_id)?;

        if self.status == CaseStatus::Cancelled {
            return Err(DomainError::precondition("cannot record QC on a cancelled case"));
        }

        Ok(vec![CaseEvent::QcRecorded(QcRecorded {
            tenant_id: cmd.tenant_id,
            case_id: cmd.case_id,
            result: cmd.result,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_link_invoice(&self, cmd: &LinkInvoice) -> Result<Vec<CaseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_case_id(cmd.case_id)?;

        if self.qc_result != Some(QcResult::Pass) {
            return Err(DomainError::precondition(
                "cannot invoice a case before QC has passed",
            ));
        }
        if let Some(existing) = self.invoice_id {
            return Err(DomainError::precondition(format!(
                "case already has invoice {existing}"
            )));
        }

        Ok(vec![CaseEvent::InvoiceLinked(InvoiceLinked {
            tenant_id: cmd.tenant_id,
            case_id: cmd.case_id,
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_unlink_invoice(&self, cmd: &UnlinkInvoice) -> Result<Vec<CaseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_case_id(cmd.case_id)?;

        let Some(invoice_id) = self.invoice_id else {
            return Err(DomainError::precondition("case has no linked invoice"));
        };

        Ok(vec![CaseEvent::InvoiceUnlinked(InvoiceUnlinked {
            tenant_id: cmd.tenant_id,
            case_id: cmd.case_id,
            invoice_id,
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

    fn test_case_id() -> CaseId {
        CaseId::new(AggregateId::new())
    }

    fn test_doctor_id() -> PartyId {
        PartyId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn registered_case(tenant_id: TenantId, case_id: CaseId) -> Case {
        let mut case = Case::empty(case_id);
        let cmd = RegisterCase {
            tenant_id,
            case_id,
            case_number: "C-000001".to_string(),
            doctor_id: test_doctor_id(),
            work_type: WorkType::Crown,
            teeth: "11,12,13".to_string(),
            priority: Priority::Normal,
            notes: None,
            occurred_at: test_time(),
        };
        let events = case.handle(&CaseCommand::RegisterCase(cmd)).unwrap();
        case.apply(&events[0]);
        case
    }

    fn transfer(case: &mut Case, tenant_id: TenantId, to: CaseStatus) -> Result<(), DomainError> {
        let cmd = Transfer {
            tenant_id,
            case_id: case.id_typed(),
            to_status: to,
            notes: None,
            rejection_reason: None,
            occurred_at: test_time(),
        };
        let events = case.handle(&CaseCommand::Transfer(cmd))?;
        case.apply(&events[0]);
        Ok(())
    }

    fn record_qc(case: &mut Case, tenant_id: TenantId, result: QcResult) {
        let cmd = RecordQc {
            tenant_id,
            case_id: case.id_typed(),
            result,
            notes: None,
            occurred_at: test_time(),
        };
        let events = case.handle(&CaseCommand::RecordQc(cmd)).unwrap();
        case.apply(&events[0]);
    }

    #[test]
    fn register_starts_at_reception() {
        let tenant_id = test_tenant_id();
        let case = registered_case(tenant_id, test_case_id());
        assert_eq!(case.status(), CaseStatus::Reception);
        assert_eq!(case.department(), Department::Reception);
        assert!(case.history().is_empty());
    }

    #[test]
    fn legal_transfer_appends_workflow_step() {
        let tenant_id = test_tenant_id();
        let mut case = registered_case(tenant_id, test_case_id());

        transfer(&mut case, tenant_id, CaseStatus::CadDesign).unwrap();

        assert_eq!(case.status(), CaseStatus::CadDesign);
        assert_eq!(case.department(), Department::CadDesign);
        assert_eq!(case.history().len(), 1);
        let step = &case.history()[0];
        assert_eq!(step.from_status, CaseStatus::Reception);
        assert_eq!(step.to_status, CaseStatus::CadDesign);
        assert_eq!(step.department, Department::CadDesign);
    }

    #[test]
    fn illegal_transfer_is_rejected() {
        let tenant_id = test_tenant_id();
        let mut case = registered_case(tenant_id, test_case_id());

        let err = transfer(&mut case, tenant_id, CaseStatus::Delivered).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
        assert_eq!(case.status(), CaseStatus::Reception);
        assert!(case.history().is_empty());
    }

    #[test]
    fn accounting_requires_passing_qc() {
        let tenant_id = test_tenant_id();
        let mut case = registered_case(tenant_id, test_case_id());
        for status in [
            CaseStatus::CadDesign,
            CaseStatus::CamMilling,
            CaseStatus::Finishing,
            CaseStatus::QualityControl,
        ] {
            transfer(&mut case, tenant_id, status).unwrap();
        }

        let err = transfer(&mut case, tenant_id, CaseStatus::Accounting).unwrap_err();
        assert!(matches!(err, DomainError::Precondition(_)));

        record_qc(&mut case, tenant_id, QcResult::Fail);
        let err = transfer(&mut case, tenant_id, CaseStatus::Accounting).unwrap_err();
        assert!(matches!(err, DomainError::Precondition(_)));

        record_qc(&mut case, tenant_id, QcResult::Pass);
        transfer(&mut case, tenant_id, CaseStatus::Accounting).unwrap();
        assert_eq!(case.status(), CaseStatus::Accounting);
    }

    #[test]
    fn cancelled_case_accepts_no_transfer() {
        let tenant_id = test_tenant_id();
        let mut case = registered_case(tenant_id, test_case_id());
        transfer(&mut case, tenant_id, CaseStatus::Cancelled).unwrap();

        let err = transfer(&mut case, tenant_id, CaseStatus::CadDesign).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn link_invoice_requires_qc_pass() {
        let tenant_id = test_tenant_id();
        let mut case = registered_case(tenant_id, test_case_id());

        let cmd = LinkInvoice {
            tenant_id,
            case_id: case.id_typed(),
            invoice_id: AggregateId::new(),
            occurred_at: test_time(),
        };
        let err = case.handle(&CaseCommand::LinkInvoice(cmd.clone())).unwrap_err();
        assert!(matches!(err, DomainError::Precondition(_)));

        record_qc(&mut case, tenant_id, QcResult::Pass);
        let events = case.handle(&CaseCommand::LinkInvoice(cmd)).unwrap();
        case.apply(&events[0]);
        assert!(case.invoice_id().is_some());
        assert!(!case.is_invoiceable());
    }

    #[test]
    fn second_invoice_link_is_rejected() {
        let tenant_id = test_tenant_id();
        let mut case = registered_case(tenant_id, test_case_id());
        record_qc(&mut case, tenant_id, QcResult::Pass);

        let first = LinkInvoice {
            tenant_id,
            case_id: case.id_typed(),
            invoice_id: AggregateId::new(),
            occurred_at: test_time(),
        };
        let events = case.handle(&CaseCommand::LinkInvoice(first)).unwrap();
        case.apply(&events[0]);

        let second = LinkInvoice {
            tenant_id,
            case_id: case.id_typed(),
            invoice_id: AggregateId::new(),
            occurred_at: test_time(),
        };
        let err = case.handle(&CaseCommand::LinkInvoice(second)).unwrap_err();
        assert!(matches!(err, DomainError::Precondition(_)));
    }

    #[test]
    fn unlink_restores_invoiceability() {
        let tenant_id = test_tenant_id();
        let mut case = registered_case(tenant_id, test_case_id());
        record_qc(&mut case, tenant_id, QcResult::Pass);

        let link = LinkInvoice {
            tenant_id,
            case_id: case.id_typed(),
            invoice_id: AggregateId::new(),
            occurred_at: test_time(),
        };
        let events = case.handle(&CaseCommand::LinkInvoice(link)).unwrap();
        case.apply(&events[0]);

        let unlink = UnlinkInvoice {
            tenant_id,
            case_id: case.id_typed(),
            occurred_at: test_time(),
        };
        let events = case.handle(&CaseCommand::UnlinkInvoice(unlink)).unwrap();
        case.apply(&events[0]);

        assert!(case.invoice_id().is_none());
        assert!(case.is_invoiceable());
    }

    #[test]
    fn returned_case_can_reenter_production() {
        let tenant_id = test_tenant_id();
        let mut case = registered_case(tenant_id, test_case_id());
        for status in [
            CaseStatus::CadDesign,
            CaseStatus::CamMilling,
            CaseStatus::Finishing,
            CaseStatus::QualityControl,
        ] {
            transfer(&mut case, tenant_id, status).unwrap();
        }
        record_qc(&mut case, tenant_id, QcResult::Pass);
        for status in [
            CaseStatus::Accounting,
            CaseStatus::ReadyForDelivery,
            CaseStatus::Delivered,
            CaseStatus::Returned,
            CaseStatus::Reception,
        ] {
            transfer(&mut case, tenant_id, status).unwrap();
        }
        assert_eq!(case.status(), CaseStatus::Reception);
        assert_eq!(case.history().len(), 9);
    }
}
