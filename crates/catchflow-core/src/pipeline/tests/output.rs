use super::*;
use crate::errors::CoupleError;
use crate::pipeline::PipelineBuilder;

fn two_module_config() -> crate::config::PipelineConfig {
    pipeline_config(
        "flux_b",
        vec![
            module_config(
                "test_source",
                "OUTPUT_1",
                &[("OUTPUT_1", "flux_a"), ("TICKS", "ticks_a")],
            ),
            module_config(
                "test_doubler",
                "OUTPUT_2",
                &[("INPUT_1", "flux_a"), ("OUTPUT_2", "flux_b")],
            ),
        ],
    )
}

#[test]
fn header_defaults_to_the_last_modules_outputs() {
    let backends = backends();
    let pipeline = PipelineBuilder::new(two_module_config(), &backends)
        .build()
        .unwrap();
    assert_eq!(pipeline.get_output_header_line(","), "flux_b");
}

#[test]
fn header_fields_can_be_overridden() {
    let backends = backends();
    let mut config = two_module_config();
    config.output_variables = vec!["flux_b".to_string()];
    config.output_header_fields = vec!["Q_OUT".to_string()];
    let pipeline = PipelineBuilder::new(config, &backends).build().unwrap();
    assert_eq!(pipeline.get_output_header_line(","), "Q_OUT");
}

#[test]
fn output_line_prints_the_current_step() {
    let backends = backends();
    let mut config = two_module_config();
    config.output_variables = vec!["flux_b".to_string(), "flux_a".to_string()];
    let mut pipeline = PipelineBuilder::new(config, &backends).build().unwrap();

    pipeline.get_response(0, 3600).unwrap();
    assert_eq!(
        pipeline.get_output_line_for_timestep(0, ",").unwrap(),
        "2.000000,1.000000"
    );
    pipeline.get_response(1, 3600).unwrap();
    assert_eq!(
        pipeline.get_output_line_for_timestep(1, ",").unwrap(),
        "4.000000,2.000000"
    );
}

#[test]
fn output_line_respects_the_configured_order() {
    let backends = backends();
    let mut config = two_module_config();
    config.output_variables = vec!["flux_a".to_string(), "flux_b".to_string()];
    let mut pipeline = PipelineBuilder::new(config, &backends).build().unwrap();
    pipeline.get_response(0, 3600).unwrap();
    assert_eq!(
        pipeline.get_output_line_for_timestep(0, " ").unwrap(),
        "1.000000 2.000000"
    );
}

#[test]
fn only_the_current_step_can_be_printed() {
    let backends = backends();
    let mut pipeline = PipelineBuilder::new(two_module_config(), &backends)
        .build()
        .unwrap();

    // Nothing has run yet.
    assert!(matches!(
        pipeline.get_output_line_for_timestep(0, ","),
        Err(CoupleError::OutputNotCurrent { .. })
    ));

    pipeline.get_response(1, 3600).unwrap();
    assert!(pipeline.get_output_line_for_timestep(1, ",").is_ok());
    assert!(matches!(
        pipeline.get_output_line_for_timestep(0, ","),
        Err(CoupleError::OutputNotCurrent {
            requested: 0,
            current: 1
        })
    ));
    assert!(matches!(
        pipeline.get_output_line_for_timestep(2, ","),
        Err(CoupleError::OutputNotCurrent {
            requested: 2,
            current: 1
        })
    ));
}
