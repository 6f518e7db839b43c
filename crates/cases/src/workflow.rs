//! Case status graph and department mapping.

use serde::{Deserialize, Serialize};

use dentflow_core::TransitionTable;

/// Production stage of a case.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Reception,
    CadDesign,
    CamMilling,
    Finishing,
    QualityControl,
    Accounting,
    ReadyForDelivery,
    Delivered,
    Returned,
    Cancelled,
}

/// Lab department responsible for a stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Reception,
    CadDesign,
    CamMilling,
    Finishing,
    QualityControl,
    Accounting,
    Delivery,
}

/// The directed workflow graph. Forward edges move the case through
/// production; backward edges are explicit rework; `cancelled` is terminal.
pub static CASE_WORKFLOW: TransitionTable<CaseStatus> = TransitionTable::new(&[
    (
        CaseStatus::Reception,
        &[CaseStatus::CadDesign, CaseStatus::Cancelled],
    ),
    (
        CaseStatus::CadDesign,
        &[CaseStatus::CamMilling, CaseStatus::Reception, CaseStatus::Cancelled],
    ),
    (
        CaseStatus::CamMilling,
        &[CaseStatus::Finishing, CaseStatus::CadDesign, CaseStatus::Cancelled],
    ),
    (
        CaseStatus::Finishing,
        &[CaseStatus::QualityControl, CaseStatus::CamMilling, CaseStatus::Cancelled],
    ),
    (
        CaseStatus::QualityControl,
        &[
            CaseStatus::Accounting,
            CaseStatus::Finishing,
            CaseStatus::CamMilling,
            CaseStatus::CadDesign,
            CaseStatus::Cancelled,
        ],
    ),
    (CaseStatus::Accounting, &[CaseStatus::ReadyForDelivery]),
    (CaseStatus::ReadyForDelivery, &[CaseStatus::Delivered]),
    (CaseStatus::Delivered, &[CaseStatus::Returned]),
    (CaseStatus::Returned, &[CaseStatus::Reception]),
    (CaseStatus::Cancelled, &[]),
]);

/// Department responsible for a status (total mapping; cancelled and returned
/// cases sit with reception for paperwork).
pub fn department_of(status: CaseStatus) -> Department {
    match status {
        CaseStatus::Reception | CaseStatus::Returned | CaseStatus::Cancelled => Department::Reception,
        CaseStatus::CadDesign => Department::CadDesign,
        CaseStatus::CamMilling => Department::CamMilling,
        CaseStatus::Finishing => Department::Finishing,
        CaseStatus::QualityControl => Department::QualityControl,
        CaseStatus::Accounting => Department::Accounting,
        CaseStatus::ReadyForDelivery | CaseStatus::Delivered => Department::Delivery,
    }
}
