use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, WorkshopError};

// ── Reference entities ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Style {
    pub style_id: i64,
    pub style_number: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    Admin,
    Manager,
    Worker,
    PatternMaker,
}

impl WorkerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Worker => "worker",
            Self::PatternMaker => "pattern_maker",
        }
    }

    /// Roles of which at most one worker may exist.
    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }
}

impl std::fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "worker" => Ok(Self::Worker),
            "pattern_maker" => Ok(Self::PatternMaker),
            _ => Err(format!("Invalid worker role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: i64,
    pub name: String,
    pub notes: String,
    pub role: WorkerRole,
    pub is_active: bool,
    pub worker_group: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RollStatus {
    Available,
    InUse,
    Exhausted,
}

impl RollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::InUse => "in-use",
            Self::Exhausted => "exhausted",
        }
    }
}

impl FromStr for RollStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "in-use" => Ok(Self::InUse),
            "exhausted" => Ok(Self::Exhausted),
            _ => Err(format!("Invalid roll status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FabricRoll {
    pub roll_id: String,
    pub style_id: i64,
    pub color: String,
    pub registration_time: String,
    pub status: RollStatus,
}

// ── Production log ───────────────────────────────────────────────────

/// Workshop process step recorded by a production log entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessName {
    /// Fabric issued from the store to the cutting table.
    Issue,
    Spread,
    Cut,
    Pack,
}

impl ProcessName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Spread => "spread",
            Self::Cut => "cut",
            Self::Pack => "pack",
        }
    }
}

impl FromStr for ProcessName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issue" => Ok(Self::Issue),
            "spread" => Ok(Self::Spread),
            "cut" => Ok(Self::Cut),
            "pack" => Ok(Self::Pack),
            _ => Err(format!("Invalid process name: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionLog {
    pub log_id: i64,
    pub task_id: Option<i64>,
    pub roll_id: Option<String>,
    pub parent_log_id: Option<i64>,
    pub worker_id: i64,
    pub process_name: ProcessName,
    pub layers_completed: Option<i64>,
    pub log_time: String,
}

// ── Orders ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub item_id: i64,
    pub order_id: i64,
    pub color: String,
    pub size: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionOrder {
    pub order_id: i64,
    pub order_number: String,
    pub style_id: i64,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<OrderItem>,
}

// ── Plans ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutSizeRatio {
    pub ratio_id: i64,
    pub layout_id: i64,
    pub size: String,
    pub ratio: i64,
}

/// A cutting task. `style_id` and `layout_name` are copies of the owning
/// plan's style and layout name, rewritten whenever the plan tree is replaced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionTask {
    pub task_id: i64,
    pub style_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout_id: Option<i64>,
    pub layout_name: String,
    pub color: String,
    pub planned_layers: i64,
    pub completed_layers: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CuttingLayout {
    pub layout_id: i64,
    pub plan_id: i64,
    pub layout_name: String,
    pub description: String,
    #[serde(default)]
    pub ratios: Vec<LayoutSizeRatio>,
    #[serde(default)]
    pub tasks: Vec<ProductionTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionPlan {
    pub plan_id: i64,
    pub plan_name: String,
    pub style_id: i64,
    pub linked_order_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_order_number: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layouts: Vec<CuttingLayout>,
}

// ── Read-side views ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskProgress {
    pub task_id: i64,
    pub style_id: i64,
    pub layout_name: String,
    pub color: String,
    pub planned_layers: i64,
    pub completed_layers: i64,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerTaskGroup {
    pub plan_id: i64,
    pub plan_name: String,
    pub style_number: String,
    pub total_planned: i64,
    pub total_completed: i64,
    pub progress: f64,
    pub tasks: Vec<ProductionTask>,
}

/// Completion percentage rounded to two decimals; zero when nothing is planned.
pub fn progress_percent(completed: i64, planned: i64) -> f64 {
    if planned == 0 {
        return 0.0;
    }
    let raw = completed as f64 / planned as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

// ── Request payloads ─────────────────────────────────────────────────

fn require_text(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(WorkshopError::validation(format!("{} is required", field)));
    }
    Ok(())
}

fn require_positive(value: i64, field: &str) -> Result<()> {
    if value < 1 {
        return Err(WorkshopError::validation(format!(
            "{} must be at least 1",
            field
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStyleRequest {
    pub style_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderItem {
    pub color: String,
    pub size: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub style_number: String,
    pub items: Vec<CreateOrderItem>,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> Result<()> {
        require_text(&self.style_number, "style_number")?;
        if self.items.is_empty() {
            return Err(WorkshopError::validation("order needs at least one item"));
        }
        for item in &self.items {
            require_text(&item.color, "item color")?;
            require_text(&item.size, "item size")?;
            require_positive(item.quantity, "item quantity")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRatio {
    pub size: String,
    pub ratio: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTaskForPlan {
    pub color: String,
    pub planned_layers: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateLayout {
    pub layout_name: String,
    #[serde(default)]
    pub description: String,
    pub ratios: Vec<CreateRatio>,
    pub tasks: Vec<CreateTaskForPlan>,
}

/// Full definition of a plan tree, used for both create and replace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDefinition {
    pub plan_name: String,
    pub style_id: i64,
    #[serde(default)]
    pub linked_order_id: Option<i64>,
    pub layouts: Vec<CreateLayout>,
}

impl PlanDefinition {
    pub fn validate(&self) -> Result<()> {
        require_text(&self.plan_name, "plan_name")?;
        require_positive(self.style_id, "style_id")?;
        if self.layouts.is_empty() {
            return Err(WorkshopError::validation("plan needs at least one layout"));
        }
        for layout in &self.layouts {
            require_text(&layout.layout_name, "layout_name")?;
            if layout.ratios.is_empty() {
                return Err(WorkshopError::validation(format!(
                    "layout '{}' needs at least one size ratio",
                    layout.layout_name
                )));
            }
            if layout.tasks.is_empty() {
                return Err(WorkshopError::validation(format!(
                    "layout '{}' needs at least one task",
                    layout.layout_name
                )));
            }
            for ratio in &layout.ratios {
                require_text(&ratio.size, "ratio size")?;
                require_positive(ratio.ratio, "ratio")?;
            }
            for task in &layout.tasks {
                require_text(&task.color, "task color")?;
                require_positive(task.planned_layers, "planned_layers")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFabricRollRequest {
    pub style_id: i64,
    pub color: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRollStatusRequest {
    pub status: RollStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductionLogRequest {
    pub task_id: Option<i64>,
    pub roll_id: Option<String>,
    pub parent_log_id: Option<i64>,
    pub worker_id: i64,
    pub process_name: ProcessName,
    pub layers_completed: Option<i64>,
}

impl CreateProductionLogRequest {
    pub fn validate(&self) -> Result<()> {
        require_positive(self.worker_id, "worker_id")?;
        if let Some(layers) = self.layers_completed {
            if layers < 0 {
                return Err(WorkshopError::validation(
                    "layers_completed cannot be negative",
                ));
            }
        }
        Ok(())
    }
}

/// Create and update share one shape; `password` is only honoured on create.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerRequest {
    pub name: String,
    #[serde(default)]
    pub notes: String,
    pub role: WorkerRole,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub worker_group: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_active() -> bool {
    true
}

impl WorkerRequest {
    pub fn validate(&self) -> Result<()> {
        require_text(&self.name, "name")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
}

// ── List filters ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FabricRollFilter {
    pub style_id: Option<i64>,
    pub color: Option<String>,
    pub status: Option<RollStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductionLogFilter {
    pub task_id: Option<i64>,
    pub roll_id: Option<String>,
    pub worker_id: Option<i64>,
    pub process_name: Option<ProcessName>,
    pub parent_log_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_definition() -> PlanDefinition {
        PlanDefinition {
            plan_name: "Spring run".into(),
            style_id: 1,
            linked_order_id: None,
            layouts: vec![CreateLayout {
                layout_name: "A".into(),
                description: String::new(),
                ratios: vec![CreateRatio {
                    size: "M".into(),
                    ratio: 2,
                }],
                tasks: vec![CreateTaskForPlan {
                    color: "Red".into(),
                    planned_layers: 40,
                }],
            }],
        }
    }

    #[test]
    fn progress_is_zero_when_nothing_planned() {
        assert_eq!(progress_percent(0, 0), 0.0);
        assert_eq!(progress_percent(5, 0), 0.0);
    }

    #[test]
    fn progress_rounds_to_two_decimals() {
        assert_eq!(progress_percent(1, 3), 33.33);
        assert_eq!(progress_percent(2, 3), 66.67);
        assert_eq!(progress_percent(0, 10), 0.0);
        assert_eq!(progress_percent(10, 10), 100.0);
    }

    #[test]
    fn progress_stays_in_range_when_completed_within_plan() {
        for planned in 1..=50 {
            for completed in 0..=planned {
                let p = progress_percent(completed, planned);
                assert!((0.0..=100.0).contains(&p), "{completed}/{planned} -> {p}");
            }
        }
    }

    #[test]
    fn role_parse_and_singletons() {
        assert_eq!(WorkerRole::from_str("pattern_maker").unwrap(), WorkerRole::PatternMaker);
        assert!(WorkerRole::from_str("boss").is_err());
        assert!(WorkerRole::Admin.is_singleton());
        assert!(WorkerRole::Manager.is_singleton());
        assert!(!WorkerRole::Worker.is_singleton());
    }

    #[test]
    fn roll_status_uses_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&RollStatus::InUse).unwrap();
        assert_eq!(json, "\"in-use\"");
        assert_eq!(RollStatus::from_str("in-use").unwrap(), RollStatus::InUse);
    }

    #[test]
    fn worker_password_hash_is_never_serialized() {
        let worker = Worker {
            worker_id: 1,
            name: "Li".into(),
            notes: String::new(),
            role: WorkerRole::Admin,
            is_active: true,
            worker_group: None,
            password_hash: Some("$2b$secret".into()),
        };
        let json = serde_json::to_value(&worker).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "admin");
    }

    #[test]
    fn plan_definition_validation() {
        assert!(sample_definition().validate().is_ok());

        let mut no_layouts = sample_definition();
        no_layouts.layouts.clear();
        assert!(no_layouts.validate().is_err());

        let mut zero_layers = sample_definition();
        zero_layers.layouts[0].tasks[0].planned_layers = 0;
        let err = zero_layers.validate().unwrap_err();
        assert!(err.to_string().contains("planned_layers"));

        let mut blank_name = sample_definition();
        blank_name.plan_name = "  ".into();
        assert!(blank_name.validate().is_err());
    }

    #[test]
    fn order_request_validation() {
        let ok = CreateOrderRequest {
            style_number: "ABC".into(),
            items: vec![CreateOrderItem {
                color: "Red".into(),
                size: "M".into(),
                quantity: 10,
            }],
        };
        assert!(ok.validate().is_ok());

        let empty = CreateOrderRequest {
            style_number: "ABC".into(),
            items: vec![],
        };
        assert!(empty.validate().is_err());

        let bad_qty = CreateOrderRequest {
            style_number: "ABC".into(),
            items: vec![CreateOrderItem {
                color: "Red".into(),
                size: "M".into(),
                quantity: 0,
            }],
        };
        assert!(bad_qty.validate().is_err());
    }
}
