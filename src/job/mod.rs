//! One-time run definitions (`runs/submit`) built from task settings.

pub mod task;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::template::{Render, required};
use task::{
    DbtTask, DbtTaskSetting, NotebookTask, NotebookTaskSetting, PipelineTask, PipelineTaskSetting,
    PythonWheelTask, PythonWheelTaskSetting, RunJobTask, RunJobTaskSetting, SparkJarTask,
    SparkJarTaskSetting, SparkPythonTask, SparkPythonTaskSetting, SparkSubmitTask,
    SparkSubmitTaskSetting, SqlTask, SqlTaskSetting,
};

/// One task of a submitted run. Exactly one task setting must be present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSubmitTaskSetting {
    pub task_key: Option<String>,
    pub existing_cluster_id: Option<String>,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub notebook_task_setting: Option<NotebookTaskSetting>,
    pub spark_python_task_setting: Option<SparkPythonTaskSetting>,
    pub spark_jar_task_setting: Option<SparkJarTaskSetting>,
    pub spark_submit_task_setting: Option<SparkSubmitTaskSetting>,
    pub python_wheel_task_setting: Option<PythonWheelTaskSetting>,
    pub sql_task_setting: Option<SqlTaskSetting>,
    pub run_job_task_setting: Option<RunJobTaskSetting>,
    pub dbt_task_setting: Option<DbtTaskSetting>,
    pub pipeline_task_setting: Option<PipelineTaskSetting>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDependency {
    pub task_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitTask {
    pub task_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_cluster_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<TaskDependency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notebook_task: Option<NotebookTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spark_python_task: Option<SparkPythonTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spark_jar_task: Option<SparkJarTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spark_submit_task: Option<SparkSubmitTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_wheel_task: Option<PythonWheelTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_task: Option<SqlTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_job_task: Option<RunJobTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dbt_task: Option<DbtTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_task: Option<PipelineTask>,
}

impl RunSubmitTaskSetting {
    fn task_count(&self) -> usize {
        [
            self.notebook_task_setting.is_some(),
            self.spark_python_task_setting.is_some(),
            self.spark_jar_task_setting.is_some(),
            self.spark_submit_task_setting.is_some(),
            self.python_wheel_task_setting.is_some(),
            self.sql_task_setting.is_some(),
            self.run_job_task_setting.is_some(),
            self.dbt_task_setting.is_some(),
            self.pipeline_task_setting.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }

    pub fn to_submit_task(&self, renderer: &dyn Render) -> Result<SubmitTask, QueryError> {
        let task_key = required(self.task_key.as_deref(), "taskKey", renderer)?;

        let count = self.task_count();
        if count != 1 {
            return Err(QueryError::config(format!(
                "task '{task_key}' must define exactly one task setting, found {count}"
            )));
        }

        let depends_on = self
            .depends_on
            .iter()
            .map(|key| {
                renderer
                    .render(key)
                    .map(|task_key| TaskDependency { task_key })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SubmitTask {
            task_key,
            existing_cluster_id: renderer.render_opt(self.existing_cluster_id.as_deref())?,
            timeout_seconds: self.timeout_seconds,
            depends_on,
            notebook_task: self
                .notebook_task_setting
                .as_ref()
                .map(|s| s.to_notebook_task(renderer))
                .transpose()?,
            spark_python_task: self
                .spark_python_task_setting
                .as_ref()
                .map(|s| s.to_spark_python_task(renderer))
                .transpose()?,
            spark_jar_task: self
                .spark_jar_task_setting
                .as_ref()
                .map(|s| s.to_spark_jar_task(renderer))
                .transpose()?,
            spark_submit_task: self
                .spark_submit_task_setting
                .as_ref()
                .map(|s| s.to_spark_submit_task(renderer))
                .transpose()?,
            python_wheel_task: self
                .python_wheel_task_setting
                .as_ref()
                .map(|s| s.to_python_wheel_task(renderer))
                .transpose()?,
            sql_task: self
                .sql_task_setting
                .as_ref()
                .map(|s| s.to_sql_task(renderer))
                .transpose()?,
            run_job_task: self
                .run_job_task_setting
                .as_ref()
                .map(|s| s.to_run_job_task(renderer))
                .transpose()?,
            dbt_task: self
                .dbt_task_setting
                .as_ref()
                .map(|s| s.to_dbt_task(renderer))
                .transpose()?,
            pipeline_task: self
                .pipeline_task_setting
                .as_ref()
                .map(|s| s.to_pipeline_task(renderer))
                .transpose()?,
        })
    }
}

/// A run definition as authored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSubmit {
    pub run_name: Option<String>,
    #[serde(default, alias = "runSubmitTaskSettings")]
    pub tasks: Vec<RunSubmitTaskSetting>,
}

/// Body of a Jobs API `runs/submit` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitRunRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_name: Option<String>,
    pub tasks: Vec<SubmitTask>,
}

impl RunSubmit {
    /// Read a definition from a `.json` or `.toml` file.
    pub fn from_path(path: &Path) -> Result<RunSubmit, QueryError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::config(format!("cannot read run definition {}: {}", path.display(), e))
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                QueryError::config(format!("invalid run definition {}: {}", path.display(), e))
            }),
            Some("toml") => toml::from_str(&content).map_err(|e| {
                QueryError::config(format!("invalid run definition {}: {}", path.display(), e))
            }),
            _ => Err(QueryError::config(format!(
                "unsupported run definition '{}' (expected .json or .toml)",
                path.display()
            ))),
        }
    }

    pub fn to_request(&self, renderer: &dyn Render) -> Result<SubmitRunRequest, QueryError> {
        if self.tasks.is_empty() {
            return Err(QueryError::config("run definition has no tasks"));
        }

        let tasks = self
            .tasks
            .iter()
            .map(|task| task.to_submit_task(renderer))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SubmitRunRequest {
            run_name: renderer.render_opt(self.run_name.as_deref())?,
            tasks,
        })
    }
}
