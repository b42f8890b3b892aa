/// Dashboard controller: selection state plus view composition.
///
/// Owns the (cached) data source and the user's current selection, and
/// turns one round of sequential fetches into a `DashboardView` for the
/// presentation layer. Nothing here fails: fetch problems become notices,
/// degenerate inputs fall back to defaults.

use crate::config::DashboardConfig;
use crate::ingest::flood_api::{FloodDataSource, list_measures, list_readings, list_stations};
use crate::model::{
    DashboardView, LabelOption, MapPoint, MapView, Measure, Notice, ReadingsTarget, Station,
};
use crate::normalize::{self, TIMESTAMP_FORMAT};
use chrono::Utc;
use std::collections::HashMap;

pub const STATION_PLACEHOLDER: &str = "Choose a station";
pub const MEASURE_PLACEHOLDER: &str = "Choose a measure";

// ---------------------------------------------------------------------------
// Label mapping
// ---------------------------------------------------------------------------

/// Insertion-ordered, unique-keyed id → label mapping for a selector.
///
/// The first label seen for an id wins; later duplicates are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelMap {
    entries: Vec<LabelOption>,
    index: HashMap<String, usize>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry; returns `false` if the id was already present.
    pub fn insert(&mut self, id: impl Into<String>, label: impl Into<String>) -> bool {
        let id = id.into();
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push(LabelOption {
            id,
            label: label.into(),
        });
        true
    }

    pub fn label(&self, id: &str) -> Option<&str> {
        self.index
            .get(id)
            .map(|&i| self.entries[i].label.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn options(&self) -> &[LabelOption] {
        &self.entries
    }

    pub fn into_options(self) -> Vec<LabelOption> {
        self.entries
    }
}

impl<I: Into<String>, L: Into<String>> FromIterator<(I, L)> for LabelMap {
    fn from_iter<T: IntoIterator<Item = (I, L)>>(iter: T) -> Self {
        let mut map = LabelMap::new();
        for (id, label) in iter {
            map.insert(id, label);
        }
        map
    }
}

pub fn station_options(stations: &[Station]) -> LabelMap {
    stations
        .iter()
        .map(|s| (s.id.as_str(), s.label.as_str()))
        .collect()
}

pub fn measure_options(measures: &[Measure]) -> LabelMap {
    measures
        .iter()
        .map(|m| (m.id.clone(), m.display_label()))
        .collect()
}

// ---------------------------------------------------------------------------
// Map helpers
// ---------------------------------------------------------------------------

/// Map center: the selected station if it has coordinates, else the mean
/// of every coordinate-bearing station, else `default`.
pub fn map_center(selected: Option<&Station>, stations: &[Station], default: (f64, f64)) -> (f64, f64) {
    if let Some(coords) = selected.and_then(Station::coordinates) {
        return coords;
    }

    let (count, lat_sum, lon_sum) = stations
        .iter()
        .filter_map(Station::coordinates)
        .fold((0usize, 0.0, 0.0), |(n, lat, lon), (la, lo)| (n + 1, lat + la, lon + lo));

    if count == 0 {
        return default;
    }
    (lat_sum / count as f64, lon_sum / count as f64)
}

/// One point per coordinate-bearing station; the selected one is flagged.
pub fn map_points(stations: &[Station], selected: Option<&str>) -> Vec<MapPoint> {
    stations
        .iter()
        .filter_map(|s| {
            let (lat, lon) = s.coordinates()?;
            Some(MapPoint {
                lat,
                lon,
                label: s.label.clone(),
                highlighted: selected == Some(s.id.as_str()),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// What the user has picked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub station: Option<String>,
    pub measure: Option<String>,
}

impl Selection {
    pub fn new(station: Option<String>, measure: Option<String>) -> Self {
        // Blank ids come from the placeholder entry of a selector.
        let non_blank = |id: Option<String>| id.filter(|s| !s.trim().is_empty());
        Self {
            station: non_blank(station),
            measure: non_blank(measure),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.station.is_none()
    }
}

pub struct Dashboard<S> {
    source: S,
    selection: Selection,
    stations: Vec<Station>,
    default_center: (f64, f64),
    lookback_hours: u64,
}

impl<S: FloodDataSource> Dashboard<S> {
    pub fn new(source: S, config: &DashboardConfig) -> Self {
        Self {
            source,
            selection: Selection::default(),
            stations: Vec::new(),
            default_center: config.default_center(),
            lookback_hours: config.lookback_hours,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Stations from the most recent refresh.
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn select(&mut self, selection: Selection) {
        if selection != self.selection {
            tracing::info!(
                station = ?selection.station,
                measure = ?selection.measure,
                "selection changed"
            );
        }
        self.selection = selection;
    }

    /// Runs one fetch round (stations, then measures and readings for the
    /// selected station) and composes the view.
    pub fn refresh(&mut self) -> DashboardView {
        let evicted = self.source.purge_expired();
        if evicted > 0 {
            tracing::debug!(evicted, "purged expired cache entries");
        }

        let mut notices = Vec::new();

        let stations = list_stations(&self.source);
        if let Some(err) = &stations.warning {
            notices.push(Notice::Warning(format!("Could not load stations: {}", err)));
        } else if stations.items.is_empty() {
            notices.push(Notice::NoData("No stations available.".to_string()));
        }
        let stations_failed = stations.warning.is_some();
        self.stations = stations.items;

        let station_map = station_options(&self.stations);

        // Only a station present in this round's list is fetched for. The
        // selection itself is kept so it comes back once the list loads.
        let selected_station = match &self.selection.station {
            Some(id) if station_map.contains(id) => Some(id.clone()),
            Some(id) => {
                if !stations_failed && !station_map.is_empty() {
                    notices.push(Notice::Warning(format!(
                        "Station {} is not in the station list.",
                        id
                    )));
                }
                None
            }
            None => None,
        };

        let mut measure_map = LabelMap::new();
        let mut selected_measure = None;
        let mut readings = Vec::new();

        if let Some(station_id) = &selected_station {
            let measures = list_measures(&self.source, station_id);
            if let Some(err) = &measures.warning {
                notices.push(Notice::Warning(format!(
                    "Could not load measures for {}: {}",
                    station_id, err
                )));
            }
            measure_map = measure_options(&measures.items);

            selected_measure = match self.selection.measure.take() {
                // When the measure list failed to load, trust the selection.
                Some(m) if measure_map.contains(&m) || measures.warning.is_some() => Some(m),
                Some(m) => {
                    tracing::info!(measure = %m, station = %station_id, "dropping measure not offered by station");
                    None
                }
                None => None,
            };
            self.selection.measure = selected_measure.clone();

            let target = match &selected_measure {
                Some(m) => ReadingsTarget::Measure(m.clone()),
                None => ReadingsTarget::Station(station_id.clone()),
            };

            let raw = list_readings(&self.source, &target);
            readings = normalize::normalize_all(&raw.items);

            if let Some(err) = &raw.warning {
                notices.push(Notice::Warning(format!("Could not load readings: {}", err)));
            } else if readings.is_empty() {
                let scope = match target {
                    ReadingsTarget::Measure(_) => "measure",
                    ReadingsTarget::Station(_) => "station",
                };
                notices.push(Notice::NoData(format!(
                    "No readings available for the selected {}.",
                    scope
                )));
            } else if !normalize::is_chronological(&readings) {
                tracing::warn!(readings_for = %target.id(), "readings arrived out of time order");
            }
        }

        let selected = selected_station
            .as_deref()
            .and_then(|id| self.stations.iter().find(|s| s.id == id));
        let (center_lat, center_lon) = map_center(selected, &self.stations, self.default_center);

        let view = DashboardView {
            station_placeholder: STATION_PLACEHOLDER.to_string(),
            selected_station_label: selected_station
                .as_deref()
                .and_then(|id| station_map.label(id))
                .map(str::to_string),
            measure_placeholder: MEASURE_PLACEHOLDER.to_string(),
            selected_measure_label: selected_measure
                .as_deref()
                .and_then(|id| measure_map.label(id))
                .map(str::to_string),
            chart_title: format!("Readings Over the Last {} Hours", self.lookback_hours),
            readings,
            map: MapView {
                center_lat,
                center_lon,
                points: map_points(&self.stations, selected_station.as_deref()),
            },
            notices,
            fetched_at: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            station_options: station_map.into_options(),
            measure_options: measure_map.into_options(),
            selected_station,
            selected_measure,
        };

        tracing::info!(
            stations = view.station_options.len(),
            station = ?view.selected_station,
            measure = ?view.selected_measure,
            readings = view.readings.len(),
            notices = view.notices.len(),
            "dashboard refreshed"
        );

        view
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
