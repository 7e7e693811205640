use std::io::Write;

use dbquery::error::QueryError;
use dbquery::job::RunSubmit;
use dbquery::job::task::{
    DbtTaskSetting, PipelineTaskSetting, RunJobTaskSetting, Source, SparkPythonTaskSetting,
    SqlTaskSetting,
};
use dbquery::template::TemplateContext;
use serde_json::json;

fn make_context() -> TemplateContext {
    TemplateContext::new()
        .with_var("env", "prod")
        .with_var("args", r#"["--date","2024-01-15"]"#)
        .with_var("params", r#"{"region":"eu"}"#)
        .with_var("job", "987")
}

fn parse(definition: serde_json::Value) -> RunSubmit {
    serde_json::from_value(definition).unwrap()
}

#[test]
fn notebook_run_renders_submit_payload() {
    let run = parse(json!({
        "runName": "nightly-{{ env }}",
        "tasks": [{
            "taskKey": "ingest",
            "existingClusterId": "0101-abc",
            "timeoutSeconds": 3600,
            "notebookTaskSetting": {
                "notebookPath": "/Repos/{{ env }}/ingest",
                "source": "WORKSPACE",
                "baseParameters": {"env": "{{ env }}", "mode": "full"}
            }
        }]
    }));

    let request = run.to_request(&make_context()).unwrap();
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({
            "run_name": "nightly-prod",
            "tasks": [{
                "task_key": "ingest",
                "existing_cluster_id": "0101-abc",
                "timeout_seconds": 3600,
                "notebook_task": {
                    "notebook_path": "/Repos/prod/ingest",
                    "source": "WORKSPACE",
                    "base_parameters": {"env": "prod", "mode": "full"}
                }
            }]
        })
    );
}

#[test]
fn template_parameters_resolve_through_json() {
    let run = parse(json!({
        "tasks": [
            {
                "taskKey": "wheel",
                "pythonWheelTaskSetting": {
                    "packageName": "etl",
                    "entryPoint": "main",
                    "parameters": "{{ args }}",
                    "namedParameters": "{{ params }}"
                }
            },
            {
                "taskKey": "jar",
                "dependsOn": ["wheel"],
                "sparkJarTaskSetting": {
                    "mainClassName": "com.acme.Main",
                    "parameters": ["{{ env }}", "x"]
                }
            }
        ]
    }));

    let value = serde_json::to_value(run.to_request(&make_context()).unwrap()).unwrap();
    assert_eq!(
        value["tasks"][0]["python_wheel_task"],
        json!({
            "entry_point": "main",
            "package_name": "etl",
            "parameters": ["--date", "2024-01-15"],
            "named_parameters": {"region": "eu"}
        })
    );
    assert_eq!(value["tasks"][1]["depends_on"], json!([{"task_key": "wheel"}]));
    assert_eq!(
        value["tasks"][1]["spark_jar_task"],
        json!({"main_class_name": "com.acme.Main", "parameters": ["prod", "x"]})
    );
    assert!(value.get("run_name").is_none());
}

#[test]
fn malformed_parameter_template_is_shape_error() {
    let run = parse(json!({
        "tasks": [{
            "taskKey": "submit",
            "sparkSubmitTaskSetting": {"parameters": "{{ env }}"}
        }]
    }));
    let err = run.to_request(&make_context()).unwrap_err();
    assert!(matches!(err, QueryError::ParameterShape { .. }), "Got: {err}");
}

#[test]
fn spark_python_requires_file_and_source() {
    let setting = SparkPythonTaskSetting {
        python_file: Some("/Workspace/{{ env }}/main.py".to_string()),
        parameters: None,
        spark_python_task_source: Some("git".to_string()),
    };
    let task = setting.to_spark_python_task(&make_context()).unwrap();
    assert_eq!(task.python_file, "/Workspace/prod/main.py");
    assert_eq!(task.source, Source::Git);
    assert_eq!(task.parameters, None);

    let missing = SparkPythonTaskSetting {
        python_file: None,
        ..setting.clone()
    };
    assert!(matches!(
        missing.to_spark_python_task(&make_context()),
        Err(QueryError::Config { .. })
    ));

    let bad_source = SparkPythonTaskSetting {
        spark_python_task_source: Some("S3".to_string()),
        ..setting
    };
    assert!(matches!(
        bad_source.to_spark_python_task(&make_context()),
        Err(QueryError::Config { .. })
    ));
}

#[test]
fn run_job_parses_rendered_job_id() {
    let setting = RunJobTaskSetting {
        job_id: Some("{{ job }}".to_string()),
        job_parameters: Some("{{ params }}".into()),
    };
    let task = setting.to_run_job_task(&make_context()).unwrap();
    assert_eq!(task.job_id, 987);
    assert_eq!(
        task.job_parameters.unwrap().get("region").map(String::as_str),
        Some("eu")
    );

    let bad = RunJobTaskSetting {
        job_id: Some("{{ env }}".to_string()),
        job_parameters: None,
    };
    let err = bad.to_run_job_task(&make_context()).unwrap_err();
    assert!(matches!(err, QueryError::Config { .. }), "Got: {err}");
}

#[test]
fn sql_task_wraps_query_id() {
    let setting = SqlTaskSetting {
        warehouse_id: Some("wh-1".to_string()),
        query_id: Some("q-{{ env }}".to_string()),
        parameters: None,
    };
    let value = serde_json::to_value(setting.to_sql_task(&make_context()).unwrap()).unwrap();
    assert_eq!(value, json!({"warehouse_id": "wh-1", "query": {"query_id": "q-prod"}}));
}

#[test]
fn dbt_omits_empty_commands() {
    let setting = DbtTaskSetting {
        warehouse_id: Some("wh-1".to_string()),
        ..Default::default()
    };
    let task = setting.to_dbt_task(&make_context()).unwrap();
    assert_eq!(task.commands, None);

    let with_commands = DbtTaskSetting {
        commands: vec!["dbt deps".to_string(), "dbt run --target {{ env }}".to_string()],
        ..Default::default()
    };
    let task = with_commands.to_dbt_task(&make_context()).unwrap();
    assert_eq!(
        task.commands,
        Some(vec!["dbt deps".to_string(), "dbt run --target prod".to_string()])
    );
}

#[test]
fn pipeline_full_refresh_accepts_template() {
    let setting: PipelineTaskSetting = serde_json::from_value(json!({
        "pipelineId": "p-1",
        "fullRefresh": "{{ env == 'prod' }}"
    }))
    .unwrap();
    let task = setting.to_pipeline_task(&make_context()).unwrap();
    assert_eq!(task.full_refresh, Some(true));

    let literal: PipelineTaskSetting =
        serde_json::from_value(json!({"pipelineId": "p-1", "fullRefresh": false})).unwrap();
    assert_eq!(literal.to_pipeline_task(&make_context()).unwrap().full_refresh, Some(false));
}

#[test]
fn task_must_define_exactly_one_setting() {
    let none = parse(json!({"tasks": [{"taskKey": "empty"}]}));
    assert!(matches!(none.to_request(&make_context()), Err(QueryError::Config { .. })));

    let two = parse(json!({
        "tasks": [{
            "taskKey": "both",
            "sparkSubmitTaskSetting": {},
            "pipelineTaskSetting": {"pipelineId": "p"}
        }]
    }));
    let err = two.to_request(&make_context()).unwrap_err();
    assert!(err.to_string().contains("exactly one"), "Got: {err}");
}

#[test]
fn task_key_is_required() {
    let run = parse(json!({"tasks": [{"sparkSubmitTaskSetting": {}}]}));
    let err = run.to_request(&make_context()).unwrap_err();
    assert!(err.to_string().contains("taskKey"), "Got: {err}");
}

#[test]
fn unrenderable_task_key_is_config_error() {
    let run = parse(json!({"tasks": [{
        "taskKey": "{{ undefined_key }}",
        "sparkSubmitTaskSetting": {}
    }]}));
    let err = run.to_request(&make_context()).unwrap_err();
    assert!(matches!(err, QueryError::Config { .. }), "Got: {err}");
    assert!(err.to_string().contains("taskKey"), "Got: {err}");
}

#[test]
fn empty_run_is_rejected() {
    let run = parse(json!({"runName": "x"}));
    assert!(matches!(run.to_request(&make_context()), Err(QueryError::Config { .. })));
}

#[test]
fn loads_toml_definition_with_legacy_task_list_name() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
runName = "from-toml"

[[runSubmitTaskSettings]]
taskKey = "submit"

[runSubmitTaskSettings.sparkSubmitTaskSetting]
parameters = ["--class", "{{{{ env }}}}"]
"#
    )
    .unwrap();

    let run = RunSubmit::from_path(file.path()).unwrap();
    let request = run.to_request(&make_context()).unwrap();
    assert_eq!(request.tasks.len(), 1);
    assert_eq!(
        request.tasks[0]
            .spark_submit_task
            .as_ref()
            .unwrap()
            .parameters,
        Some(vec!["--class".to_string(), "prod".to_string()])
    );
}

#[test]
fn unsupported_definition_extension_is_config_error() {
    let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    assert!(matches!(
        RunSubmit::from_path(file.path()),
        Err(QueryError::Config { .. })
    ));
}
