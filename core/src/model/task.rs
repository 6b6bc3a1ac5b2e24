use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "cancelled" | "canceled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A logistics task (delivery, production run, scrap run) owned by a tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticsTask {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub task_type: String,
    pub task_data: serde_json::Value,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub status: TaskStatus,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewLogisticsTask {
    pub title: String,
    pub description: Option<String>,
    pub task_type: String,
    pub task_data: serde_json::Value,
    pub priority: i32,
    pub assigned_to: Option<Uuid>,
}

impl NewLogisticsTask {
    pub fn new(title: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            task_type: task_type.into(),
            task_data: serde_json::json!({}),
            priority: 0,
            assigned_to: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.task_data = data;
        self
    }

    pub fn assigned_to(mut self, user_id: Uuid) -> Self {
        self.assigned_to = Some(user_id);
        self
    }

    pub(crate) fn into_task(self, tenant_id: Uuid, created_by: Uuid) -> LogisticsTask {
        let now = Utc::now();
        let status = if self.assigned_to.is_some() {
            TaskStatus::InProgress
        } else {
            TaskStatus::Pending
        };
        LogisticsTask {
            id: Uuid::new_v4(),
            tenant_id,
            title: self.title,
            description: self.description,
            task_type: self.task_type,
            task_data: self.task_data,
            created_by,
            assigned_to: self.assigned_to,
            status,
            priority: self.priority,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}
