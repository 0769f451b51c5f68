pub mod events;
pub mod models;
pub mod money;
pub mod plans;
pub mod storage;

pub use events::{WalletEvent, WalletEventKind};
pub use models::{
    AmountType, BenefitCategory, BenefitType, CategoryAssociation, CategoryPlanAccount,
    CostBreakdown, CycleCreditTransaction, EXPENSE_TYPE_PRIORITY, ExpenseSubtype, ExpenseType,
    GlobalProcedure, ProcedureStatus, ReimbursementClaim, ReimbursementCycleCredits,
    ReimbursementRequest, ReimbursementRequestState, ReimbursementType, ReimbursementWallet,
    TreatmentProcedure,
};
pub use money::{Money, MoneyError};
pub use plans::{
    CostSharingCategory, CoverageKind, EmployerHealthPlan, MemberHealthPlan, PlanCoverage,
    PlanSize, ProcedureType, Tier,
};
pub use storage::{
    ClaimSyncUpdate, CurrencyAdjuster, FlagProvider, NotificationSink, ProcedureCatalog,
    WalletStore,
};
