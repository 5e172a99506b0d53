//! Minijinja rendering of rain predictions into alert messages.
//!
//! Templates are compiled once into a [`minijinja::Environment`] owned by
//! the renderer. Rendering reads nothing but its arguments, so the same
//! predictions, location and language always give the same bytes.

use minijinja::{context, Environment};
use rainalert_core::{LanguagePreference, Location, Prediction};

use crate::traits::NotifyError;

const HINDI_TEMPLATE: &str = "\
🌧️ बारिश की चेतावनी: {{ location }}
{% for day in days %}
• {{ day.date }} ({{ day.label }}): {{ day.rain_mm | round(1) }} मिमी बारिश, संभावना {{ day.probability | round }}%
  तापमान {{ day.temp_min | round }}-{{ day.temp_max | round }}°C, नमी {{ day.humidity | round }}%, हवा {{ day.wind | round }} किमी/घंटा
{% endfor %}
कृपया कटाई, छिड़काव और सिंचाई की योजना इसी के अनुसार बनाएं।";

const ENGLISH_TEMPLATE: &str = "\
🌧️ Rain alert: {{ location }}
{% for day in days %}
• {{ day.date }} ({{ day.label }}): {{ day.rain_mm | round(1) }} mm rain, {{ day.probability | round }}% chance
  Temp {{ day.temp_min | round }}-{{ day.temp_max | round }}°C, humidity {{ day.humidity | round }}%, wind {{ day.wind | round }} km/h
{% endfor %}
Please plan harvesting, spraying and irrigation accordingly.";

/// One forecast day as the templates see it.
#[derive(Debug, serde::Serialize)]
struct DayContext {
    date: String,
    label: String,
    rain_mm: f64,
    probability: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: f64,
    wind: f64,
}

#[derive(Debug, Clone, Copy)]
enum Script {
    Hindi,
    English,
}

impl Script {
    fn template_name(self) -> &'static str {
        match self {
            Script::Hindi => "hindi",
            Script::English => "english",
        }
    }

    fn day_label(self, days_from_now: u32) -> String {
        match (self, days_from_now) {
            (Script::Hindi, 0) => "आज".to_string(),
            (Script::Hindi, 1) => "कल".to_string(),
            (Script::Hindi, n) => format!("{n} दिन बाद"),
            (Script::English, 0) => "today".to_string(),
            (Script::English, 1) => "tomorrow".to_string(),
            (Script::English, n) => format!("in {n} days"),
        }
    }
}

/// Renders rain alerts in the subscriber's language.
#[derive(Debug)]
pub struct MessageRenderer {
    env: Environment<'static>,
}

impl MessageRenderer {
    pub fn new() -> Result<Self, NotifyError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_filter("round", round_filter);
        env.add_template("hindi", HINDI_TEMPLATE)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        env.add_template("english", ENGLISH_TEMPLATE)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(Self { env })
    }

    /// Render one message for `predictions` at `location`.
    ///
    /// `Both` renders the Hindi block, a blank line, then the English block.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if there is nothing to render or a
    /// template fails to evaluate.
    pub fn render(
        &self,
        predictions: &[Prediction],
        location: &Location,
        language: LanguagePreference,
    ) -> Result<String, NotifyError> {
        if predictions.is_empty() {
            return Err(NotifyError::Template("no predictions to render".to_string()));
        }

        match language {
            LanguagePreference::Hindi => self.render_script(Script::Hindi, predictions, location),
            LanguagePreference::English => self.render_script(Script::English, predictions, location),
            LanguagePreference::Both => {
                let hindi = self.render_script(Script::Hindi, predictions, location)?;
                let english = self.render_script(Script::English, predictions, location)?;
                Ok(format!("{hindi}\n\n{english}"))
            }
        }
    }

    fn render_script(
        &self,
        script: Script,
        predictions: &[Prediction],
        location: &Location,
    ) -> Result<String, NotifyError> {
        let days: Vec<DayContext> = predictions
            .iter()
            .map(|p| DayContext {
                date: p.date.format("%d/%m/%Y").to_string(),
                label: script.day_label(p.days_from_now),
                rain_mm: p.rain_volume_mm,
                probability: p.precipitation_probability,
                temp_min: p.temp_min_c,
                temp_max: p.temp_max_c,
                humidity: p.humidity_pct,
                wind: p.wind_speed_kmh,
            })
            .collect();

        let template = self
            .env
            .get_template(script.template_name())
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        template
            .render(context! { location => location.label(), days => days })
            .map_err(|e| NotifyError::Template(e.to_string()))
    }
}

/// Custom filter: round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}
