//! `task_create`, `task_get`, `task_update`, `task_delete`, `task_list`
//! (§4.5). A minimal in-process CRUD store; task planning/scheduling
//! policy belongs to the host.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::registry::{ToolHandler, ToolRegistry};
use crate::types::{ParamDef, ToolDefinition};

#[derive(Debug, Clone)]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub done: bool,
}

#[derive(Default)]
pub struct TaskStore {
    tasks: Mutex<IndexMap<u64, Task>>,
    next_id: Mutex<u64>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self { tasks: Mutex::new(IndexMap::new()), next_id: Mutex::new(1) }
    }

    pub fn create(&self, title: String) -> u64 {
        let mut next_id = self.next_id.lock().expect("lock poisoned");
        let id = *next_id;
        *next_id += 1;
        self.tasks.lock().expect("lock poisoned").insert(id, Task { id, title, done: false });
        id
    }

    pub fn get(&self, id: u64) -> Option<Task> {
        self.tasks.lock().expect("lock poisoned").get(&id).cloned()
    }

    pub fn update(&self, id: u64, title: Option<String>, done: Option<bool>) -> bool {
        let mut tasks = self.tasks.lock().expect("lock poisoned");
        let Some(task) = tasks.get_mut(&id) else { return false };
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(done) = done {
            task.done = done;
        }
        true
    }

    pub fn delete(&self, id: u64) -> bool {
        self.tasks.lock().expect("lock poisoned").shift_remove(&id).is_some()
    }

    pub fn list(&self) -> Vec<Task> {
        self.tasks.lock().expect("lock poisoned").values().cloned().collect()
    }
}

fn task_json(task: &Task) -> Value {
    json!({ "id": task.id, "title": task.title, "done": task.done })
}

struct CreateHandler(Arc<TaskStore>);

#[async_trait]
impl ToolHandler for CreateHandler {
    async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String> {
        let title = arguments.get("title").and_then(|v| v.as_str()).ok_or("missing 'title'")?;
        let id = self.0.create(title.to_string());
        Ok(id.to_string())
    }
}

struct GetHandler(Arc<TaskStore>);

#[async_trait]
impl ToolHandler for GetHandler {
    async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String> {
        let id = arguments.get("id").and_then(|v| v.as_u64()).ok_or("missing 'id'")?;
        self.0.get(id).map(|t| task_json(&t).to_string()).ok_or_else(|| format!("task {id} not found"))
    }
}

struct UpdateHandler(Arc<TaskStore>);

#[async_trait]
impl ToolHandler for UpdateHandler {
    async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String> {
        let id = arguments.get("id").and_then(|v| v.as_u64()).ok_or("missing 'id'")?;
        let title = arguments.get("title").and_then(|v| v.as_str()).map(|s| s.to_string());
        let done = arguments.get("done").and_then(|v| v.as_bool());
        if self.0.update(id, title, done) {
            Ok("updated".to_string())
        } else {
            Err(format!("task {id} not found"))
        }
    }
}

struct DeleteHandler(Arc<TaskStore>);

#[async_trait]
impl ToolHandler for DeleteHandler {
    async fn call(&self, arguments: &IndexMap<String, Value>) -> Result<String, String> {
        let id = arguments.get("id").and_then(|v| v.as_u64()).ok_or("missing 'id'")?;
        if self.0.delete(id) {
            Ok("deleted".to_string())
        } else {
            Err(format!("task {id} not found"))
        }
    }
}

struct ListHandler(Arc<TaskStore>);

#[async_trait]
impl ToolHandler for ListHandler {
    async fn call(&self, _arguments: &IndexMap<String, Value>) -> Result<String, String> {
        let tasks: Vec<Value> = self.0.list().iter().map(task_json).collect();
        Ok(serde_json::to_string(&tasks).unwrap_or_else(|_| "[]".to_string()))
    }
}

pub fn register_task_tools(registry: &mut ToolRegistry, store: Arc<TaskStore>) {
    registry.register(
        ToolDefinition {
            name: "task_create".to_string(),
            description: "Create a task".to_string(),
            parameters: IndexMap::from([("title".to_string(), ParamDef::required("string", "task title"))]),
            category: Some("task".to_string()),
            annotations: None,
        },
        Arc::new(CreateHandler(Arc::clone(&store))),
    );
    registry.register(
        ToolDefinition {
            name: "task_get".to_string(),
            description: "Get a task by id".to_string(),
            parameters: IndexMap::from([("id".to_string(), ParamDef::required("number", "task id"))]),
            category: Some("task".to_string()),
            annotations: Some(crate::types::ToolAnnotations { read_only: Some(true), ..Default::default() }),
        },
        Arc::new(GetHandler(Arc::clone(&store))),
    );
    registry.register(
        ToolDefinition {
            name: "task_update".to_string(),
            description: "Update a task's title or completion state".to_string(),
            parameters: IndexMap::from([
                ("id".to_string(), ParamDef::required("number", "task id")),
                ("title".to_string(), ParamDef::optional("string", "new title")),
                ("done".to_string(), ParamDef::optional("boolean", "completion state")),
            ]),
            category: Some("task".to_string()),
            annotations: None,
        },
        Arc::new(UpdateHandler(Arc::clone(&store))),
    );
    registry.register(
        ToolDefinition {
            name: "task_delete".to_string(),
            description: "Delete a task".to_string(),
            parameters: IndexMap::from([("id".to_string(), ParamDef::required("number", "task id"))]),
            category: Some("task".to_string()),
            annotations: Some(crate::types::ToolAnnotations { destructive: Some(true), ..Default::default() }),
        },
        Arc::new(DeleteHandler(Arc::clone(&store))),
    );
    registry.register(
        ToolDefinition {
            name: "task_list".to_string(),
            description: "List all tasks".to_string(),
            parameters: IndexMap::new(),
            category: Some("task".to_string()),
            annotations: Some(crate::types::ToolAnnotations { read_only: Some(true), ..Default::default() }),
        },
        Arc::new(ListHandler(store)),
    );
}
