use super::{ContinuousModel, IntegratorError, QspConstants, QspVariable};

/// A continuous model whose state only changes through `set_variable`
///
/// Used for ABM-only runs: concentrations are held fixed and exchange
/// deltas accumulate without any kinetics.
///
/// # Example
/// ```
/// use spqsp_abm_core::qsp::{ContinuousModel, QspConstants, QspVariable, StaticModel};
///
/// let mut model = StaticModel::new(QspConstants::default())
///     .with_variable(QspVariable::CentralTeff, 1e-12);
/// model.solve(0.0, 3600.0).unwrap();
/// assert_eq!(model.variable(QspVariable::CentralTeff), 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StaticModel {
    values: Vec<f64>,
    constants: QspConstants,
}

impl StaticModel {
    pub fn new(constants: QspConstants) -> Self {
        Self {
            values: vec![0.0; QspVariable::ALL.len()],
            constants,
        }
    }

    pub fn with_variable(mut self, var: QspVariable, value: f64) -> Self {
        self.values[var.index()] = value;
        self
    }
}

impl ContinuousModel for StaticModel {
    fn variable(&self, var: QspVariable) -> f64 {
        self.values[var.index()]
    }

    fn set_variable(&mut self, var: QspVariable, value: f64) {
        self.values[var.index()] = value;
    }

    fn constants(&self) -> &QspConstants {
        &self.constants
    }

    fn solve(&mut self, _t0: f64, _duration: f64) -> Result<(), IntegratorError> {
        Ok(())
    }

    fn state_vector(&self) -> Vec<f64> {
        self.values.clone()
    }

    fn restore_state_vector(&mut self, state: &[f64]) -> Result<(), IntegratorError> {
        if state.len() != self.values.len() {
            return Err(IntegratorError::StateSize {
                expected: self.values.len(),
                actual: state.len(),
            });
        }
        self.values.copy_from_slice(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_state_vector() {
        let mut model = StaticModel::new(QspConstants::default())
            .with_variable(QspVariable::DamageSignal, 2.0);
        let saved = model.state_vector();
        model.set_variable(QspVariable::DamageSignal, 9.0);
        model.restore_state_vector(&saved).unwrap();
        assert_eq!(model.variable(QspVariable::DamageSignal), 2.0);
        assert!(model.restore_state_vector(&[1.0]).is_err());
    }
}
