//! Current weather from Open-Meteo (no API key required)

use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolGroup, ToolInputSchema, ToolResult,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,apparent_temperature,precipitation,weather_code,wind_speed_10m";
const WEATHER_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WeatherTool {
    definition: ToolDefinition,
    client: reqwest::Client,
}

impl WeatherTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "location".to_string(),
            PropertySchema::string("City name or location to get weather for"),
        );

        WeatherTool {
            definition: ToolDefinition {
                name: "get_weather".to_string(),
                description: "Get current weather information for a specific location. \
                    ONLY use when user explicitly asks about WEATHER, temperature, or conditions. \
                    Provides temperature, weather conditions, wind speed, and humidity. \
                    Input should be a city name."
                    .to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["location".to_string()],
                },
                group: ToolGroup::Web,
            },
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct WeatherParams {
    location: String,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<GeoPlace>>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeoPlace {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentConditions>,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentConditions {
    temperature_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    relative_humidity_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    #[serde(default)]
    precipitation: Option<f64>,
    #[serde(default)]
    weather_code: Option<i64>,
}

/// WMO weather interpretation codes
fn weather_condition(code: i64) -> String {
    let text = match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        other => return format!("Unknown (code: {})", other),
    };
    text.to_string()
}

fn fahrenheit(celsius: f64) -> f64 {
    ((celsius * 9.0 / 5.0 + 32.0) * 10.0).round() / 10.0
}

fn or_na(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn format_weather(place: &GeoPlace, current: &CurrentConditions) -> String {
    format!(
        "🌤️ Weather for {}, {}\n\n\
         📍 Location: {}°N, {}°E\n\n\
         🌡️ Temperature: {}°C ({}°F)\n\
         🤔 Feels like: {}°C ({}°F)\n\
         ☁️ Conditions: {}\n\
         💧 Humidity: {}%\n\
         💨 Wind Speed: {} km/h\n\
         🌧️ Precipitation: {} mm\n",
        place.name,
        place.country.as_deref().unwrap_or(""),
        place.latitude,
        place.longitude,
        or_na(current.temperature_2m),
        or_na(current.temperature_2m.map(fahrenheit)),
        or_na(current.apparent_temperature),
        or_na(current.apparent_temperature.map(fahrenheit)),
        weather_condition(current.weather_code.unwrap_or(0)),
        or_na(current.relative_humidity_2m),
        or_na(current.wind_speed_10m),
        current.precipitation.unwrap_or(0.0),
    )
}

impl WeatherTool {
    async fn lookup(&self, location: &str) -> Result<String, reqwest::Error> {
        let geo: GeocodingResponse = self
            .client
            .get(GEOCODING_URL)
            .query(&[("name", location), ("count", "1"), ("language", "en"), ("format", "json")])
            .timeout(WEATHER_TIMEOUT)
            .send()
            .await?
            .json()
            .await?;

        let place = match geo.results.and_then(|r| r.into_iter().next()) {
            Some(place) => place,
            None => {
                return Ok(format!(
                    "❌ Could not find location: {}. Please try a different city name.",
                    location
                ))
            }
        };

        let forecast: ForecastResponse = self
            .client
            .get(FORECAST_URL)
            .query(&[
                ("latitude", place.latitude.to_string()),
                ("longitude", place.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("timezone", "auto".to_string()),
            ])
            .timeout(WEATHER_TIMEOUT)
            .send()
            .await?
            .json()
            .await?;

        match forecast.current {
            Some(current) => {
                log::info!("[WEATHER] Retrieved weather for {}", place.name);
                Ok(format_weather(&place, &current))
            }
            None => Ok("❌ Could not retrieve weather data. Please try again.".to_string()),
        }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        let params: WeatherParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };
        log::info!("[WEATHER] Getting weather for: {}", params.location);

        match self.lookup(&params.location).await {
            Ok(text) if text.starts_with('❌') => ToolResult::error(text),
            Ok(text) => ToolResult::success(text).with_metadata(json!({ "location": params.location })),
            Err(e) if e.is_timeout() => {
                ToolResult::error("❌ Weather service timed out. Please try again.")
            }
            Err(e) => {
                log::error!("[WEATHER] Error getting weather: {}", e);
                ToolResult::error(format!("❌ Error getting weather: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_definition() {
        let def = WeatherTool::new().definition();
        assert_eq!(def.name, "get_weather");
        assert_eq!(def.input_schema.required, vec!["location"]);
    }

    #[test]
    fn test_weather_codes() {
        assert_eq!(weather_condition(0), "Clear sky");
        assert_eq!(weather_condition(63), "Moderate rain");
        assert_eq!(weather_condition(42), "Unknown (code: 42)");
    }

    #[test]
    fn test_fahrenheit_rounds_to_one_decimal() {
        assert_eq!(fahrenheit(20.0), 68.0);
        assert_eq!(fahrenheit(21.3), 70.3);
    }

    #[test]
    fn test_format_weather() {
        let place = GeoPlace {
            name: "Lisbon".to_string(),
            latitude: 38.72,
            longitude: -9.13,
            country: Some("Portugal".to_string()),
        };
        let current: CurrentConditions = serde_json::from_value(json!({
            "temperature_2m": 21.5,
            "apparent_temperature": 20.0,
            "relative_humidity_2m": 60,
            "wind_speed_10m": 12.4,
            "precipitation": 0.2,
            "weather_code": 2
        }))
        .unwrap();

        let text = format_weather(&place, &current);
        assert!(text.starts_with("🌤️ Weather for Lisbon, Portugal\n\n📍 Location: 38.72°N, -9.13°E"));
        assert!(text.contains("🌡️ Temperature: 21.5°C (70.7°F)"));
        assert!(text.contains("☁️ Conditions: Partly cloudy"));
        assert!(text.contains("💧 Humidity: 60%"));
        assert!(text.contains("🌧️ Precipitation: 0.2 mm"));
    }

    #[test]
    fn test_missing_values_render_as_na() {
        let place = GeoPlace {
            name: "Nowhere".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            country: None,
        };
        let text = format_weather(&place, &CurrentConditions::default());
        assert!(text.contains("Temperature: N/A°C (N/A°F)"));
        assert!(text.contains("Conditions: Clear sky"));
    }
}
