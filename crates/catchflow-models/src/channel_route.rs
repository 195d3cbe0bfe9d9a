//! Lag-and-attenuate channel routing.
//!
//! A single linear channel store: discharge relaxes toward the lateral
//! inflow with a configurable smoothing weight per step. Consumes the runoff
//! another module produces, which makes it the canonical downstream half of
//! a two-module pipeline.

use catchflow_core::errors::{CoupleError, CoupleResult};
use catchflow_core::marshal::{self, NativeValue};
use catchflow_core::module::ModuleBackend;
use tracing::debug;

use crate::init_text;

pub const MODEL_TYPE: &str = "channel_route";

const Q_LATERAL: &str = "Q_LATERAL";
const Q_CHANNEL: &str = "Q_CHANNEL";

const STEP_H: f64 = 1.0;

pub struct ChannelRouteBackend {
    /// Smoothing weight per step, in (0, 1].
    alpha: f64,
    /// Lateral inflow input, mm h^-1.
    lateral: f64,
    /// Routed discharge output, mm h^-1.
    discharge: f64,
    current_h: f64,
    end_h: f64,
}

impl ChannelRouteBackend {
    pub fn new() -> Self {
        Self {
            alpha: 0.5,
            lateral: 0.0,
            discharge: 0.0,
            current_h: 0.0,
            end_h: 24.0 * 365.0,
        }
    }

    fn known_var(&self, name: &str) -> CoupleResult<()> {
        match name {
            Q_LATERAL | Q_CHANNEL => Ok(()),
            _ => Err(CoupleError::UnknownVariable(name.to_string())),
        }
    }
}

impl Default for ChannelRouteBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleBackend for ChannelRouteBackend {
    fn initialize(&mut self, init_config: &str) -> CoupleResult<()> {
        let pairs = init_text::parse_pairs(init_config)?;
        for (key, value) in pairs {
            match key.as_str() {
                "alpha" => {
                    if !(value > 0.0 && value <= 1.0) {
                        return Err(CoupleError::Config(format!(
                            "channel routing alpha must be in (0, 1], got {value}"
                        )));
                    }
                    self.alpha = value;
                }
                "end_time" => self.end_h = value,
                other => {
                    return Err(CoupleError::Config(format!(
                        "channel routing does not recognise init key '{other}'"
                    )));
                }
            }
        }
        debug!(alpha = self.alpha, end_h = self.end_h, "initialised channel routing");
        Ok(())
    }

    fn update(&mut self) -> CoupleResult<()> {
        self.discharge += self.alpha * (self.lateral - self.discharge);
        self.current_h += STEP_H;
        Ok(())
    }

    fn finalize(&mut self) -> CoupleResult<()> {
        Ok(())
    }

    fn input_var_names(&self) -> Vec<String> {
        vec![Q_LATERAL.to_string()]
    }

    fn output_var_names(&self) -> Vec<String> {
        vec![Q_CHANNEL.to_string()]
    }

    fn var_type(&self, name: &str) -> CoupleResult<String> {
        self.known_var(name)?;
        Ok("double".to_string())
    }

    fn var_item_size(&self, name: &str) -> CoupleResult<usize> {
        self.known_var(name)?;
        Ok(8)
    }

    fn var_nbytes(&self, name: &str) -> CoupleResult<usize> {
        self.var_item_size(name)
    }

    fn var_units(&self, name: &str) -> CoupleResult<String> {
        self.known_var(name)?;
        Ok("mm h^-1".to_string())
    }

    fn value(&self, name: &str) -> CoupleResult<NativeValue> {
        match name {
            Q_CHANNEL => Ok(NativeValue::F64(vec![self.discharge])),
            Q_LATERAL => Ok(NativeValue::F64(vec![self.lateral])),
            _ => Err(CoupleError::UnknownVariable(name.to_string())),
        }
    }

    fn set_value(&mut self, name: &str, value: NativeValue) -> CoupleResult<()> {
        let scalar = marshal::scalar_from_native(name, &value)?;
        match name {
            Q_LATERAL => self.lateral = scalar,
            _ => return Err(CoupleError::UnknownVariable(name.to_string())),
        }
        Ok(())
    }

    fn start_time(&self) -> f64 {
        0.0
    }

    fn end_time(&self) -> f64 {
        self.end_h
    }

    fn current_time(&self) -> f64 {
        self.current_h
    }

    fn time_step(&self) -> f64 {
        STEP_H
    }

    fn time_units(&self) -> String {
        "hr".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn discharge_relaxes_toward_inflow() {
        let mut model = ChannelRouteBackend::new();
        model.initialize("alpha = 0.5").unwrap();
        model
            .set_value(Q_LATERAL, NativeValue::F64(vec![10.0]))
            .unwrap();
        model.update().unwrap();
        model.update().unwrap();
        let q = match model.value(Q_CHANNEL).unwrap() {
            NativeValue::F64(values) => values[0],
            other => panic!("unexpected native value {other:?}"),
        };
        assert!(is_close!(q, 7.5));
    }

    #[test]
    fn alpha_bounds_are_enforced() {
        let mut model = ChannelRouteBackend::new();
        assert!(model.initialize("alpha = 0.0").is_err());
        assert!(model.initialize("alpha = 1.5").is_err());
        assert!(model.initialize("alpha = 1.0").is_ok());
    }
}
