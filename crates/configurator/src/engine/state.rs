//! Stage tables and state transitions.
//!
//! The engine runs on two tracks. The normal track is the ordered cycle of
//! [`Stage`]s. The recovery track is a short sequence of [`RecoveryStage`]s
//! entered when a stage fails for good, after which the engine either resumes
//! the normal track at a given stage or ends the cycle.

use crate::op::{
    AcceptPartialRefresh, ApplyAllProfiles, CompileTemplates, GenerateAllTemplates, Operation,
    RefreshAllProfiles, ReloadServices, ResetStaging, RestoreGeneratedTemplates,
};

static COMPILE_TEMPLATES: CompileTemplates = CompileTemplates;
static REFRESH_ALL_PROFILES: RefreshAllProfiles = RefreshAllProfiles;
static APPLY_ALL_PROFILES: ApplyAllProfiles = ApplyAllProfiles;
static GENERATE_ALL_TEMPLATES: GenerateAllTemplates = GenerateAllTemplates;
static RELOAD_SERVICES: ReloadServices = ReloadServices;
static ACCEPT_PARTIAL_REFRESH: AcceptPartialRefresh = AcceptPartialRefresh;
static RESET_STAGING: ResetStaging = ResetStaging;
static RESTORE_GENERATED_TEMPLATES: RestoreGeneratedTemplates = RestoreGeneratedTemplates;

/// A normal-track stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Runs once, before the first cycle.
    CompileTemplates,
    RefreshAllProfiles,
    ApplyAllProfiles,
    GenerateAllTemplates,
    ReloadServices,
}

impl Stage {
    /// First stage of every cycle.
    pub const CYCLE_START: Stage = Stage::RefreshAllProfiles;

    /// The stage that follows this one, or `None` at the end of a cycle.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::CompileTemplates => Some(Stage::RefreshAllProfiles),
            Stage::RefreshAllProfiles => Some(Stage::ApplyAllProfiles),
            Stage::ApplyAllProfiles => Some(Stage::GenerateAllTemplates),
            Stage::GenerateAllTemplates => Some(Stage::ReloadServices),
            Stage::ReloadServices => None,
        }
    }

    /// Whether a failure is retried before the recovery track is entered.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Stage::RefreshAllProfiles | Stage::GenerateAllTemplates | Stage::ReloadServices
        )
    }

    pub fn operation(self) -> &'static dyn Operation {
        match self {
            Stage::CompileTemplates => &COMPILE_TEMPLATES,
            Stage::RefreshAllProfiles => &REFRESH_ALL_PROFILES,
            Stage::ApplyAllProfiles => &APPLY_ALL_PROFILES,
            Stage::GenerateAllTemplates => &GENERATE_ALL_TEMPLATES,
            Stage::ReloadServices => &RELOAD_SERVICES,
        }
    }
}

/// A recovery-track stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryStage {
    AcceptPartialRefresh,
    ResetStaging,
    RestoreGeneratedTemplates,
}

impl RecoveryStage {
    /// The recovery stage that follows this one within its sequence.
    pub fn next(self) -> Option<RecoveryStage> {
        match self {
            RecoveryStage::AcceptPartialRefresh => None,
            RecoveryStage::ResetStaging => Some(RecoveryStage::RestoreGeneratedTemplates),
            RecoveryStage::RestoreGeneratedTemplates => None,
        }
    }

    pub fn operation(self) -> &'static dyn Operation {
        match self {
            RecoveryStage::AcceptPartialRefresh => &ACCEPT_PARTIAL_REFRESH,
            RecoveryStage::ResetStaging => &RESET_STAGING,
            RecoveryStage::RestoreGeneratedTemplates => &RESTORE_GENERATED_TEMPLATES,
        }
    }
}

/// Where the normal track picks up once recovery completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resume {
    At(Stage),
    EndCycle,
}

/// What the engine executes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextState {
    Starting,
    Running(Stage),
    Recovering { step: RecoveryStage, resume: Resume },
    /// The cycle is over; sleep `refresh_interval` or stop.
    Sleeping,
    /// Graceful stop.
    Stopped,
    /// Unrecoverable failure.
    Failed,
}

impl NextState {
    pub fn after_success(stage: Stage) -> NextState {
        stage.next().map(NextState::Running).unwrap_or(NextState::Sleeping)
    }

    /// The failure transition: maps a stage that failed for good to the entry
    /// of its recovery sequence, or to `Failed` when it has none.
    pub fn on_failure(stage: Stage) -> NextState {
        match stage {
            Stage::CompileTemplates => NextState::Failed,
            Stage::RefreshAllProfiles => NextState::Recovering {
                step: RecoveryStage::AcceptPartialRefresh,
                resume: Resume::At(Stage::ApplyAllProfiles),
            },
            // Templates that did render still have their services reloaded.
            Stage::GenerateAllTemplates => NextState::Recovering {
                step: RecoveryStage::RestoreGeneratedTemplates,
                resume: Resume::At(Stage::ReloadServices),
            },
            Stage::ApplyAllProfiles | Stage::ReloadServices => NextState::Recovering {
                step: RecoveryStage::ResetStaging,
                resume: Resume::EndCycle,
            },
        }
    }

    pub fn after_recovery_step(step: RecoveryStage, resume: Resume) -> NextState {
        match step.next() {
            Some(next) => NextState::Recovering { step: next, resume },
            None => match resume {
                Resume::At(stage) => NextState::Running(stage),
                Resume::EndCycle => NextState::Sleeping,
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NextState::Stopped | NextState::Failed)
    }

    pub fn is_recovering(&self) -> bool {
        matches!(self, NextState::Recovering { .. })
    }
}
