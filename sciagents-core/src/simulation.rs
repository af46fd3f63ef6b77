//! Parameter-driven toy simulators for each domain.
//!
//! Each domain model reads numeric parameters from an experiment design and
//! emits named series. The models are illustrative curves with Gaussian noise
//! and make no claim to physical accuracy. A model that errors is replaced by
//! a fixed fallback dataset; a model that produces nothing defers to the
//! general model.

use crate::config::SimulationConfig;
use crate::domain::Domain;
use crate::error::SimulationError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::Mutex;

type Series = BTreeMap<String, Vec<f64>>;

/// Series produced by one simulation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationOutput {
    pub data: Series,
    /// Name of the independent-variable series.
    pub independent: Option<String>,
    /// Name of the primary response series.
    pub response: Option<String>,
    /// True when the fallback dataset replaced a failed model.
    pub fallback: bool,
}

impl SimulationOutput {
    fn insert(&mut self, name: &str, values: Vec<f64>) {
        self.data.insert(name.to_string(), values);
    }

    /// Record a series pair and make it primary unless one is already set.
    fn pair(&mut self, x_name: &str, xs: Vec<f64>, y_name: &str, ys: Vec<f64>) {
        if self.independent.is_none() {
            self.independent = Some(x_name.to_string());
            self.response = Some(y_name.to_string());
        }
        self.insert(x_name, xs);
        self.insert(y_name, ys);
    }

    pub fn independent_series(&self) -> Option<&[f64]> {
        self.independent
            .as_ref()
            .and_then(|k| self.data.get(k))
            .map(Vec::as_slice)
    }

    pub fn response_series(&self) -> Option<&[f64]> {
        self.response
            .as_ref()
            .and_then(|k| self.data.get(k))
            .map(Vec::as_slice)
    }

    fn check_finite(&self) -> Result<(), SimulationError> {
        match self
            .data
            .iter()
            .find(|(_, values)| values.iter().any(|v| !v.is_finite()))
        {
            Some((series, _)) => Err(SimulationError::NonFinite {
                series: series.clone(),
            }),
            None => Ok(()),
        }
    }

    fn fallback() -> Self {
        let mut out = Self {
            fallback: true,
            ..Self::default()
        };
        out.pair(
            "parameter_values",
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            "measured_response",
            vec![10.0, 15.0, 22.0, 28.0, 35.0],
        );
        out.insert("measurement_error", vec![0.5, 0.7, 1.0, 0.8, 1.2]);
        out
    }
}

/// Evenly spaced values over `[start, end]`, inclusive.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

fn invalid(name: &str, reason: &str) -> SimulationError {
    SimulationError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Read `key` as a list of numbers. A bare number is a one-element list.
fn levels(params: &Map<String, Value>, key: &str) -> Result<Option<Vec<f64>>, SimulationError> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(|v| Some(vec![v]))
            .ok_or_else(|| invalid(key, "expected a number")),
        Some(Value::Array(items)) => items
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<_>>>()
            .map(Some)
            .ok_or_else(|| invalid(key, "expected a list of numbers")),
        Some(_) => Err(invalid(key, "expected a list of numbers")),
    }
}

fn levels_or(
    params: &Map<String, Value>,
    key: &str,
    default: &[f64],
) -> Result<Vec<f64>, SimulationError> {
    Ok(levels(params, key)?.unwrap_or_else(|| default.to_vec()))
}

fn scalar(params: &Map<String, Value>, key: &str, default: f64) -> Result<f64, SimulationError> {
    match params.get(key) {
        None => Ok(default),
        Some(value) => value.as_f64().ok_or_else(|| invalid(key, "expected a number")),
    }
}

/// First parameter, in key order, whose value is a non-empty numeric list.
fn first_numeric_list(params: &Map<String, Value>) -> Option<(String, Vec<f64>)> {
    params.iter().find_map(|(key, value)| {
        let items = value.as_array()?;
        let values = items.iter().map(Value::as_f64).collect::<Option<Vec<_>>>()?;
        (!values.is_empty()).then(|| (key.clone(), values))
    })
}

fn mentions(measurements: &[String], words: &[&str]) -> bool {
    measurements.iter().any(|m| {
        let m = m.to_lowercase();
        words.iter().any(|w| m.contains(w))
    })
}

/// Domain simulator with a shared, optionally seeded noise source.
pub struct GenericSimulator {
    rng: Mutex<StdRng>,
    config: SimulationConfig,
}

impl GenericSimulator {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
            config,
        }
    }

    /// Reproducible simulator with default settings.
    pub fn with_seed(seed: u64) -> Self {
        Self::new(SimulationConfig {
            seed: Some(seed),
            ..SimulationConfig::default()
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run the model for `domain`; never fails.
    pub fn run_experiment(
        &self,
        domain: &str,
        parameters: &Map<String, Value>,
        measurements: &[String],
    ) -> SimulationOutput {
        let domain = Domain::from_name(domain);
        tracing::debug!(domain = %domain, params = parameters.len(), "Running simulation");

        let result = self.simulate(domain, parameters, measurements).and_then(|out| {
            if out.data.is_empty() && domain != Domain::General {
                tracing::debug!(domain = %domain, "No model triggered; using general model");
                self.simulate(Domain::General, parameters, measurements)
            } else {
                Ok(out)
            }
        });

        match result.and_then(|out| out.check_finite().map(|_| out)) {
            Ok(out) => {
                tracing::debug!(domain = %domain, series = out.data.len(), "Simulation completed");
                out
            }
            Err(e) => {
                tracing::error!(domain = %domain, error = %e, "Simulation error; using fallback dataset");
                SimulationOutput::fallback()
            }
        }
    }

    fn simulate(
        &self,
        domain: Domain,
        params: &Map<String, Value>,
        measurements: &[String],
    ) -> Result<SimulationOutput, SimulationError> {
        let noise = self.config.domain_settings(domain.as_str()).noise_level;
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let mut sim = Run {
            rng: &mut *rng,
            params,
            measurements,
            noise,
            out: SimulationOutput::default(),
        };
        match domain {
            Domain::Physics => {
                sim.physics()?;
                let mut out = sim.out;
                self.pendulum_series(params, &mut out)?;
                Ok(out)
            }
            Domain::Chemistry => sim.chemistry().map(|_| sim.out),
            Domain::Biology => sim.biology().map(|_| sim.out),
            Domain::Environmental => sim.environmental().map(|_| sim.out),
            Domain::Engineering => sim.engineering().map(|_| sim.out),
            Domain::Medicine => sim.medicine().map(|_| sim.out),
            Domain::General => sim.general().map(|_| sim.out),
        }
    }

    fn pendulum_series(
        &self,
        params: &Map<String, Value>,
        out: &mut SimulationOutput,
    ) -> Result<(), SimulationError> {
        if !params.contains_key("initial_angle") {
            return Ok(());
        }
        let angle = scalar(params, "initial_angle", 0.0)?;
        let pendulum = PendulumSimulator {
            length: scalar(params, "length", 1.0)?,
            ..PendulumSimulator::default()
        };
        let (times, angles) = pendulum.simulate(
            angle,
            self.config.default_steps,
            self.config.default_time_step,
            scalar(params, "damping", 0.01)?,
        );
        out.pair("pendulum_time", times, "pendulum_angle", angles);
        Ok(())
    }
}

/// One model evaluation with the rng lock held.
struct Run<'a> {
    rng: &'a mut StdRng,
    params: &'a Map<String, Value>,
    measurements: &'a [String],
    noise: f64,
    out: SimulationOutput,
}

impl Run<'_> {
    /// Box-Muller normal sample.
    fn gauss(&mut self, mean: f64, sd: f64) -> f64 {
        if sd == 0.0 {
            return mean;
        }
        let u1: f64 = 1.0 - self.rng.r#gen::<f64>();
        let u2: f64 = self.rng.r#gen::<f64>();
        mean + sd * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn physics(&mut self) -> Result<(), SimulationError> {
        if let Some(temps) = levels(self.params, "temperature")? {
            let noise = self.noise;
            let response = temps
                .iter()
                .map(|t| {
                    let effect = (-1000.0 / (8.314 * (t + 273.15))).exp();
                    (100.0 * effect * (1.0 + self.gauss(0.0, noise))).max(0.0)
                })
                .collect();
            self.out
                .pair("temperature_levels", temps, "response_values", response);
        }

        if mentions(self.measurements, &["force", "motion"]) {
            let duration = scalar(self.params, "time_duration", 10.0)?;
            let f = scalar(self.params, "frequency", 1.0)?;
            let d = scalar(self.params, "damping", 0.1)?;
            let times = linspace(0.0, duration, 100);
            let w = 2.0 * PI * f;
            let displacement = times
                .iter()
                .map(|t| (-d * t).exp() * (w * t).cos() + self.gauss(0.0, 0.01))
                .collect();
            let velocity = times
                .iter()
                .map(|t| {
                    let decay = (-d * t).exp();
                    -d * decay * (w * t).cos() - w * decay * (w * t).sin() + self.gauss(0.0, 0.05)
                })
                .collect();
            self.out.pair("time_data", times, "displacement", displacement);
            self.out.insert("velocity", velocity);
        }
        Ok(())
    }

    fn chemistry(&mut self) -> Result<(), SimulationError> {
        if let Some(conc) = levels(self.params, "concentration")? {
            let order = scalar(self.params, "reaction_order", 1.5)?;
            let noise = self.noise;
            let rates = conc
                .iter()
                .map(|c| (0.1 * c.powf(order) * (1.0 + self.gauss(0.0, noise))).max(0.0))
                .collect();
            self.out
                .pair("concentration_levels", conc, "reaction_rates", rates);
        }

        if let Some(temps) = levels(self.params, "temperature")? {
            let constants = temps
                .iter()
                .map(|t| {
                    let k = 1e6 * (-50_000.0 / (8.314 * (t + 273.15))).exp();
                    k * (1.0 + self.gauss(0.0, 0.03))
                })
                .collect();
            self.out
                .pair("temperature_celsius", temps, "rate_constants", constants);
        }

        if let Some(ph) = levels(self.params, "pH")? {
            let activity = ph
                .iter()
                .map(|p| {
                    let a = (-0.5 * ((p - 7.0) / 1.5).powi(2)).exp();
                    (a * (1.0 + self.gauss(0.0, 0.04))).max(0.0)
                })
                .collect();
            self.out.pair("pH_levels", ph, "activity_coefficients", activity);
        }
        Ok(())
    }

    fn biology(&mut self) -> Result<(), SimulationError> {
        if let Some(light) = levels(self.params, "light_intensity")? {
            let noise = self.noise;
            let rates = light
                .iter()
                .map(|l| (50.0 * l / (200.0 + l) * (1.0 + self.gauss(0.0, noise))).max(0.0))
                .collect();
            self.out
                .pair("light_levels_lux", light, "photosynthesis_rate", rates);
        }

        if let Some(nutrients) = levels(self.params, "nutrient_concentration")? {
            let growth = nutrients
                .iter()
                .map(|n| (15.0 * n / (1.0 + n) + self.gauss(0.0, 0.2)).max(0.0))
                .collect();
            self.out
                .pair("nutrient_levels", nutrients, "growth_rates", growth);
        }

        if self.params.contains_key("observation_period") {
            let period = scalar(self.params, "observation_period", 100.0)?;
            let (k, n0, r) = (1000.0, 50.0, 0.05);
            let times = linspace(0.0, period, 50);
            let population = times
                .iter()
                .map(|t| {
                    let n = k / (1.0 + ((k - n0) / n0) * (-r * t).exp());
                    (n * self.gauss(1.0, 0.1)).max(1.0)
                })
                .collect();
            self.out.pair("time_hours", times, "population_size", population);
        }
        Ok(())
    }

    fn environmental(&mut self) -> Result<(), SimulationError> {
        if let Some(aqi) = levels(self.params, "air_quality_index")? {
            let noise = self.noise;
            let impact = aqi
                .iter()
                .map(|a| {
                    let base = 100.0 * (1.0 - (-a / 150.0).exp());
                    (base * (1.0 + self.gauss(0.0, noise))).max(0.0)
                })
                .collect();
            self.out
                .pair("air_quality_index", aqi, "health_impact_score", impact);
        }

        if let Some(humidity) = levels(self.params, "humidity")? {
            let response = humidity
                .iter()
                .map(|h| {
                    let curve = 100.0 * (-0.01 * (h - 60.0).powi(2)).exp();
                    let seasonal = 10.0 * (0.1 * h).sin();
                    (curve + seasonal + self.gauss(0.0, 5.0)).max(0.0)
                })
                .collect();
            self.out
                .pair("humidity_percent", humidity, "ecosystem_response", response);
        }

        if let Some(co2) = levels(self.params, "carbon_concentration")? {
            let anomaly = co2
                .iter()
                .map(|c| 3.0 * (c / 350.0).ln() / 2f64.ln() + self.gauss(0.0, 0.2))
                .collect();
            self.out.pair("co2_ppm", co2, "temperature_anomaly", anomaly);
        }
        Ok(())
    }

    fn engineering(&mut self) -> Result<(), SimulationError> {
        if mentions(self.measurements, &["stress", "strain"]) {
            let stress = levels_or(
                self.params,
                "applied_stress",
                &[0.0, 10.0, 20.0, 30.0, 40.0, 50.0],
            )?;
            let (modulus, yield_strength) = (200_000.0, 250.0);
            let strain = stress
                .iter()
                .map(|s| {
                    let base = if *s <= yield_strength {
                        s / modulus * 100.0
                    } else {
                        yield_strength / modulus * 100.0 + (s - yield_strength) * 0.001
                    };
                    (base * (1.0 + self.gauss(0.0, 0.02))).max(0.0)
                })
                .collect();
            self.out.pair("stress_mpa", stress, "strain_percent", strain);
        }

        if mentions(self.measurements, &["efficiency"]) {
            let power = levels_or(
                self.params,
                "input_power",
                &[100.0, 200.0, 300.0, 400.0, 500.0],
            )?;
            let efficiency = power
                .iter()
                .map(|p| {
                    let e = 85.0 * (-0.000_005 * (p - 300.0).powi(2)).exp();
                    (e + self.gauss(0.0, 1.5)).clamp(0.0, 100.0)
                })
                .collect();
            self.out
                .pair("input_power_watts", power, "efficiency_percent", efficiency);
        }
        Ok(())
    }

    fn medicine(&mut self) -> Result<(), SimulationError> {
        let doses = match levels(self.params, "dosage")? {
            Some(d) => Some(d),
            None => levels(self.params, "dose")?,
        };
        if let Some(doses) = doses {
            let (max_response, ec50, hill) = (100.0, 10.0_f64, 2);
            let response = doses
                .iter()
                .map(|d| {
                    let dn = d.powi(hill);
                    let r = max_response * dn / (ec50.powi(hill) + dn);
                    (r + self.gauss(0.0, 5.0)).max(0.0)
                })
                .collect();
            self.out
                .pair("dosage_mg", doses, "therapeutic_response", response);
        }

        if mentions(self.measurements, &["time_course"]) {
            let dose = scalar(self.params, "initial_dose", 100.0)?;
            let times = linspace(0.0, 24.0, 48);
            let plasma = times
                .iter()
                .map(|t| dose * (-0.1 * t).exp() + self.gauss(0.0, 2.0))
                .collect();
            self.out
                .pair("time_hours", times, "plasma_concentration", plasma);
        }
        Ok(())
    }

    fn general(&mut self) -> Result<(), SimulationError> {
        let (key, xs) = first_numeric_list(self.params).unwrap_or_else(|| {
            (
                "parameter_levels".to_string(),
                (1..=10).map(f64::from).collect(),
            )
        });

        let linear: Vec<f64> = xs.iter().map(|x| 10.0 + 5.0 * x + self.gauss(0.0, 1.0)).collect();
        let exponential: Vec<f64> = xs
            .iter()
            .map(|x| 50.0 * (1.0 - (-0.3 * x).exp()) + self.gauss(0.0, 2.0))
            .collect();
        let polynomial: Vec<f64> = xs
            .iter()
            .map(|x| 20.0 + 3.0 * x - 0.1 * x * x + self.gauss(0.0, 1.5))
            .collect();
        let logarithmic: Vec<f64> = xs
            .iter()
            .map(|x| 30.0 * (x + 1.0).ln() + self.gauss(0.0, 1.0))
            .collect();

        let primary = if mentions(self.measurements, &["growth"]) {
            &exponential
        } else if mentions(self.measurements, &["saturation"]) {
            &logarithmic
        } else if mentions(self.measurements, &["optimization"]) {
            &polynomial
        } else {
            &linear
        };
        let measured = primary.clone();

        self.out.pair(&key, xs, "measured_response", measured);
        self.out.insert("linear_response", linear);
        self.out.insert("exponential_response", exponential);
        self.out.insert("polynomial_response", polynomial);
        self.out.insert("logarithmic_response", logarithmic);
        Ok(())
    }
}

/// Damped nonlinear pendulum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendulumSimulator {
    pub length: f64,
    pub gravity: f64,
}

impl Default for PendulumSimulator {
    fn default() -> Self {
        Self {
            length: 1.0,
            gravity: 9.81,
        }
    }
}

impl PendulumSimulator {
    /// Semi-implicit Euler integration from rest at `initial_angle` radians.
    pub fn simulate(
        &self,
        initial_angle: f64,
        steps: usize,
        dt: f64,
        damping: f64,
    ) -> (Vec<f64>, Vec<f64>) {
        let mut times = Vec::with_capacity(steps);
        let mut angles = Vec::with_capacity(steps);
        let (mut theta, mut omega) = (initial_angle, 0.0);

        for i in 0..steps {
            times.push(i as f64 * dt);
            angles.push(theta);
            let alpha = -(self.gravity / self.length) * theta.sin() - 2.0 * damping * omega;
            omega += alpha * dt;
            theta += omega * dt;
        }
        (times, angles)
    }
}
