use serde::{Deserialize, Serialize};

/// Method the Conductor HTTP task calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
}

/// Kind of a Conductor task definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskType {
    Http,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HttpRequest {
    pub uri: String,
    pub method: HttpVerb,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InputParameters {
    pub http_request: HttpRequest,
}

/// Task definition registered through `PUT /metadata/taskdefs`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDef {
    pub name: String,
    pub task_reference_name: String,
    pub input_parameters: InputParameters,
    #[serde(rename = "type")]
    pub task_type: TaskType,
}

impl TaskDef {
    /// The HTTP search task patched before every run.
    pub fn elasticsearch_search() -> Self {
        Self {
            name: "search_elasticsearch".to_string(),
            task_reference_name: "get_es_1".to_string(),
            input_parameters: InputParameters {
                http_request: HttpRequest {
                    uri: "http://preview-elasticsearch-client:9200/conductor/_search?size=10"
                        .to_string(),
                    method: HttpVerb::Get,
                },
            },
            task_type: TaskType::Http,
        }
    }
}

/// Input sent with every `POST /workflow/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartWorkflowInput {
    pub task2_name: String,
}

impl StartWorkflowInput {
    pub fn new(task2_name: impl Into<String>) -> Self {
        Self {
            task2_name: task2_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_def_wire_format() {
        let value = serde_json::to_value(TaskDef::elasticsearch_search()).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "search_elasticsearch",
                "taskReferenceName": "get_es_1",
                "inputParameters": {
                    "http_request": {
                        "uri": "http://preview-elasticsearch-client:9200/conductor/_search?size=10",
                        "method": "GET"
                    }
                },
                "type": "HTTP"
            })
        );
    }

    #[test]
    fn test_start_input_wire_format() {
        let value = serde_json::to_value(StartWorkflowInput::new("task_5")).unwrap();
        assert_eq!(value, json!({"task2Name": "task_5"}));
    }
}
