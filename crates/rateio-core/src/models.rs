//! Domain models for rateio

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Stored lines
// ============================================================================

/// Status of a mirrored phone line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineStatus {
    #[default]
    Active,
    Inactive,
}

impl LineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for LineStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" | "ativo" => Ok(Self::Active),
            "inactive" | "inativo" => Ok(Self::Inactive),
            _ => Err(format!("Unknown line status: {}", s)),
        }
    }
}

impl std::fmt::Display for LineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A phone line persisted in the mirror table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub id: i64,
    /// Natural key, unique across the table (active and inactive)
    pub line_number: String,
    pub full_name: Option<String>,
    pub status: LineStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Spreadsheet rows
// ============================================================================

/// One data row read from the spreadsheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRow {
    /// 1-indexed data row (the header row is not counted)
    pub line: usize,
    pub line_number: String,
    pub name: String,
}

impl ExternalRow {
    pub fn new(line: usize, line_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            line,
            line_number: line_number.into(),
            name: name.into(),
        }
    }
}

// ============================================================================
// Diffs
// ============================================================================

/// Classification of a reconciliation row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffKind {
    /// In the sheet, not among active stored lines
    Create,
    /// In both, stored name differs from the sheet
    Update,
    /// Active stored line missing from the sheet
    AbsentFromSheet,
}

impl DiffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::AbsentFromSheet => "ABSENT_FROM_SHEET",
        }
    }
}

impl std::fmt::Display for DiffKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Spreadsheet side of a diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalView {
    pub name: String,
}

/// Stored side of a diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredView {
    pub id: i64,
    pub full_name: Option<String>,
    pub status: LineStatus,
}

/// One reconciliation row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    pub line_number: String,
    pub kind: DiffKind,
    pub external_view: Option<ExternalView>,
    pub stored_view: Option<StoredView>,
}

/// Diff counts per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    #[serde(rename = "criar")]
    pub create: usize,
    #[serde(rename = "atualizar")]
    pub update: usize,
    #[serde(rename = "ausentes")]
    pub absent: usize,
}

impl SyncSummary {
    pub fn from_diffs(diffs: &[Diff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff.kind {
                DiffKind::Create => summary.create += 1,
                DiffKind::Update => summary.update += 1,
                DiffKind::AbsentFromSheet => summary.absent += 1,
            }
        }
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.create == 0 && self.update == 0 && self.absent == 0
    }
}

/// A sheet row whose name cell is blank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptyName {
    pub line: usize,
    pub line_number: String,
}

/// Non-blocking findings attached to a preview
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncWarnings {
    pub empty_names: Vec<EmptyName>,
}

/// Result of a preview
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPreview {
    pub diffs: Vec<Diff>,
    pub summary: SyncSummary,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub warnings: Option<SyncWarnings>,
    /// SHA-256 of the normalized sheet rows the diff was computed from
    pub source_hash: String,
}

// ============================================================================
// Validation
// ============================================================================

/// A line number shared by several sheet rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateKey {
    pub numero: String,
    pub lines: Vec<usize>,
}

/// A sheet row whose line number fails the format rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidRow {
    pub line: usize,
    pub value: String,
}

/// Everything wrong with a sheet, for rendering back to the operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub duplicates: Vec<DuplicateKey>,
    pub invalid_rows: Vec<InvalidRow>,
    pub empty_names: Vec<EmptyName>,
}

impl ValidationReport {
    /// Duplicates and invalid rows block the sync; empty names do not
    pub fn is_blocking(&self) -> bool {
        !self.duplicates.is_empty() || !self.invalid_rows.is_empty()
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} duplicate line number(s), {} invalid row(s)",
            self.duplicates.len(),
            self.invalid_rows.len()
        )
    }
}

// ============================================================================
// Selection and apply
// ============================================================================

/// What to do with stored lines that disappeared from the sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnMissingPolicy {
    #[default]
    Inactivate,
    KeepActive,
}

impl OnMissingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactivate => "INACTIVATE",
            Self::KeepActive => "KEEP_ACTIVE",
        }
    }
}

impl std::str::FromStr for OnMissingPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "inactivate" => Ok(Self::Inactivate),
            "keep_active" | "keep" => Ok(Self::KeepActive),
            _ => Err(format!("Unknown on-missing policy: {}", s)),
        }
    }
}

impl std::fmt::Display for OnMissingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operator's per-row choice in the review table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionAction {
    /// Adopt the spreadsheet value
    ApplyExternal,
    /// Ignore this diff
    KeepStored,
}

/// Transient per-row toggle state, keyed by line number
pub type SelectionMap = HashMap<String, SelectionAction>;

/// Approved subset of a diff, by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    pub criar: Vec<String>,
    pub atualizar: Vec<String>,
    pub ausentes: Vec<String>,
    pub manter: Vec<String>,
}

impl Selection {
    /// Select every diff
    pub fn all(diffs: &[Diff]) -> Self {
        let choices: SelectionMap = diffs
            .iter()
            .map(|d| (d.line_number.clone(), SelectionAction::ApplyExternal))
            .collect();
        Self::from_choices(diffs, &choices)
    }

    /// Build a selection from the review table's toggles
    ///
    /// Diffs without a toggle are left out entirely.
    pub fn from_choices(diffs: &[Diff], choices: &SelectionMap) -> Self {
        let mut selection = Self::default();
        for diff in diffs {
            let key = diff.line_number.clone();
            match choices.get(&diff.line_number) {
                Some(SelectionAction::ApplyExternal) => match diff.kind {
                    DiffKind::Create => selection.criar.push(key),
                    DiffKind::Update => selection.atualizar.push(key),
                    DiffKind::AbsentFromSheet => selection.ausentes.push(key),
                },
                Some(SelectionAction::KeepStored) => selection.manter.push(key),
                None => {}
            }
        }
        selection
    }

    /// Whether `diff` was approved. `manter` always wins.
    pub fn selects(&self, diff: &Diff) -> bool {
        if self.manter.contains(&diff.line_number) {
            return false;
        }
        let list = match diff.kind {
            DiffKind::Create => &self.criar,
            DiffKind::Update => &self.atualizar,
            DiffKind::AbsentFromSheet => &self.ausentes,
        };
        list.contains(&diff.line_number)
    }

    pub fn is_empty(&self) -> bool {
        self.criar.is_empty() && self.atualizar.is_empty() && self.ausentes.is_empty()
    }
}

/// Parameters for an apply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    /// `None` applies every diff; an empty selection applies nothing
    pub selection: Option<Selection>,
    pub on_missing: OnMissingPolicy,
    /// Reject the apply if the sheet no longer hashes to this value
    pub expected_hash: Option<String>,
}

/// A row that could not be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    pub line_number: String,
    pub kind: DiffKind,
    pub error: String,
}

/// Counts of what an apply committed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub inserted: usize,
    pub updated: usize,
    pub inactivated: usize,
    pub kept_active: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<RowFailure>,
}

impl ApplyResult {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

// ============================================================================
// Sync history
// ============================================================================

/// A recorded apply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRun {
    pub id: i64,
    pub user: String,
    pub policy: OnMissingPolicy,
    pub inserted: i64,
    pub updated: i64,
    pub inactivated: i64,
    pub kept_active: i64,
    pub failed: i64,
    pub source_hash: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Roles
// ============================================================================

/// Caller role, from the static key → role mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Viewer => "viewer",
        }
    }

    /// Roles allowed to write synced lines
    pub fn can_apply(&self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "manager" | "gestor" => Ok(Self::Manager),
            "viewer" | "user" | "usuario" => Ok(Self::Viewer),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who is asking, as resolved by the auth layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    pub user: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user: impl Into<String>, role: Role) -> Self {
        Self {
            user: user.into(),
            role,
        }
    }

    /// Operator at the local CLI, trusted like an admin
    pub fn local() -> Self {
        let user = std::env::var("USER").unwrap_or_else(|_| "cli".to_string());
        Self::new(format!("cli:{}", user), Role::Admin)
    }
}
