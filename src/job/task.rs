//! Task settings as authored in run definitions, and the Jobs API payloads
//! they render to.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::params::{ParameterArgument, resolve_list, resolve_map};
use crate::template::{Render, required};

/// Where a notebook or Python file is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
    Workspace,
    Git,
}

impl Source {
    pub fn parse(text: &str) -> Result<Source, QueryError> {
        match text.trim().to_ascii_uppercase().as_str() {
            "WORKSPACE" => Ok(Source::Workspace),
            "GIT" => Ok(Source::Git),
            other => Err(QueryError::config(format!(
                "invalid source '{other}' (expected WORKSPACE or GIT)"
            ))),
        }
    }
}

/// A boolean that may also be written as a template.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FlagArgument {
    Literal(bool),
    TemplateExpression(String),
}

impl FlagArgument {
    fn resolve(&self, name: &str, renderer: &dyn Render) -> Result<bool, QueryError> {
        match self {
            FlagArgument::Literal(value) => Ok(*value),
            FlagArgument::TemplateExpression(template) => {
                let rendered = renderer.render(template)?;
                match rendered.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(true),
                    "false" => Ok(false),
                    other => Err(QueryError::config(format!(
                        "'{name}' must render to true or false, got '{other}'"
                    ))),
                }
            }
        }
    }
}

// --- notebook ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookTaskSetting {
    pub notebook_path: Option<String>,
    pub source: Option<Source>,
    pub base_parameters: Option<ParameterArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotebookTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notebook_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_parameters: Option<IndexMap<String, String>>,
}

impl NotebookTaskSetting {
    pub fn to_notebook_task(&self, renderer: &dyn Render) -> Result<NotebookTask, QueryError> {
        Ok(NotebookTask {
            notebook_path: renderer.render_opt(self.notebook_path.as_deref())?,
            source: self.source,
            base_parameters: resolve_map(self.base_parameters.as_ref(), renderer)?,
        })
    }
}

// --- spark python ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparkPythonTaskSetting {
    pub python_file: Option<String>,
    pub parameters: Option<ParameterArgument>,
    pub spark_python_task_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SparkPythonTask {
    pub python_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
    pub source: Source,
}

impl SparkPythonTaskSetting {
    pub fn to_spark_python_task(
        &self,
        renderer: &dyn Render,
    ) -> Result<SparkPythonTask, QueryError> {
        let python_file = required(self.python_file.as_deref(), "pythonFile", renderer)?;
        let source = required(
            self.spark_python_task_source.as_deref(),
            "sparkPythonTaskSource",
            renderer,
        )?;
        Ok(SparkPythonTask {
            python_file,
            parameters: resolve_list(self.parameters.as_ref(), renderer)?,
            source: Source::parse(&source)?,
        })
    }
}

// --- spark jar ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparkJarTaskSetting {
    pub jar_uri: Option<String>,
    pub main_class_name: Option<String>,
    pub parameters: Option<ParameterArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SparkJarTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jar_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
}

impl SparkJarTaskSetting {
    pub fn to_spark_jar_task(&self, renderer: &dyn Render) -> Result<SparkJarTask, QueryError> {
        Ok(SparkJarTask {
            jar_uri: renderer.render_opt(self.jar_uri.as_deref())?,
            main_class_name: renderer.render_opt(self.main_class_name.as_deref())?,
            parameters: resolve_list(self.parameters.as_ref(), renderer)?,
        })
    }
}

// --- spark submit ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparkSubmitTaskSetting {
    pub parameters: Option<ParameterArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SparkSubmitTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
}

impl SparkSubmitTaskSetting {
    pub fn to_spark_submit_task(
        &self,
        renderer: &dyn Render,
    ) -> Result<SparkSubmitTask, QueryError> {
        Ok(SparkSubmitTask {
            parameters: resolve_list(self.parameters.as_ref(), renderer)?,
        })
    }
}

// --- python wheel ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PythonWheelTaskSetting {
    pub entry_point: Option<String>,
    pub package_name: Option<String>,
    pub parameters: Option<ParameterArgument>,
    pub named_parameters: Option<ParameterArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PythonWheelTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub named_parameters: Option<IndexMap<String, String>>,
}

impl PythonWheelTaskSetting {
    pub fn to_python_wheel_task(
        &self,
        renderer: &dyn Render,
    ) -> Result<PythonWheelTask, QueryError> {
        Ok(PythonWheelTask {
            entry_point: renderer.render_opt(self.entry_point.as_deref())?,
            package_name: renderer.render_opt(self.package_name.as_deref())?,
            parameters: resolve_list(self.parameters.as_ref(), renderer)?,
            named_parameters: resolve_map(self.named_parameters.as_ref(), renderer)?,
        })
    }
}

// --- sql ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlTaskSetting {
    pub warehouse_id: Option<String>,
    pub query_id: Option<String>,
    pub parameters: Option<ParameterArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlTaskQuery {
    pub query_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<SqlTaskQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<IndexMap<String, String>>,
}

impl SqlTaskSetting {
    pub fn to_sql_task(&self, renderer: &dyn Render) -> Result<SqlTask, QueryError> {
        Ok(SqlTask {
            warehouse_id: renderer.render_opt(self.warehouse_id.as_deref())?,
            query: renderer
                .render_opt(self.query_id.as_deref())?
                .map(|query_id| SqlTaskQuery { query_id }),
            parameters: resolve_map(self.parameters.as_ref(), renderer)?,
        })
    }
}

// --- run job ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunJobTaskSetting {
    pub job_id: Option<String>,
    pub job_parameters: Option<ParameterArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunJobTask {
    pub job_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_parameters: Option<IndexMap<String, String>>,
}

impl RunJobTaskSetting {
    pub fn to_run_job_task(&self, renderer: &dyn Render) -> Result<RunJobTask, QueryError> {
        let job_id = required(self.job_id.as_deref(), "jobId", renderer)?;
        let job_id = job_id.trim().parse::<i64>().map_err(|e| {
            QueryError::config(format!("jobId '{job_id}' is not a valid job id: {e}"))
        })?;
        Ok(RunJobTask {
            job_id,
            job_parameters: resolve_map(self.job_parameters.as_ref(), renderer)?,
        })
    }
}

// --- dbt ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbtTaskSetting {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub warehouse_id: Option<String>,
    #[serde(default)]
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbtTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<String>>,
}

impl DbtTaskSetting {
    pub fn to_dbt_task(&self, renderer: &dyn Render) -> Result<DbtTask, QueryError> {
        let commands = self
            .commands
            .iter()
            .map(|command| renderer.render(command))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DbtTask {
            catalog: renderer.render_opt(self.catalog.as_deref())?,
            schema: renderer.render_opt(self.schema.as_deref())?,
            warehouse_id: renderer.render_opt(self.warehouse_id.as_deref())?,
            commands: (!commands.is_empty()).then_some(commands),
        })
    }
}

// --- pipeline ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTaskSetting {
    pub pipeline_id: Option<String>,
    pub full_refresh: Option<FlagArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_refresh: Option<bool>,
}

impl PipelineTaskSetting {
    pub fn to_pipeline_task(&self, renderer: &dyn Render) -> Result<PipelineTask, QueryError> {
        Ok(PipelineTask {
            pipeline_id: renderer.render_opt(self.pipeline_id.as_deref())?,
            full_refresh: self
                .full_refresh
                .as_ref()
                .map(|flag| flag.resolve("fullRefresh", renderer))
                .transpose()?,
        })
    }
}
