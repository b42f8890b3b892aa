/// Test fixtures: representative JSON payloads from the Environment Agency
/// flood-monitoring API.
///
/// These fixtures are structurally faithful but truncated to the minimum
/// needed to exercise the parsers. They reflect the linked-data envelope
/// returned by:
///   https://environment.data.gov.uk/flood-monitoring/id/...
///
/// Response shape (all list endpoints):
///   response.items[]
///
/// Station item:   .notation, .label, .lat, .long, .riverName, .town
/// Measure item:   .notation, .label, .parameterName, .unitName
/// Reading item:   .dateTime (ISO 8601, "Z" suffix), .value (number), .measure (URI)
///
/// Note: a handful of real stations publish `label`, `lat` and `long` as
/// arrays (multi-site records). Parsers take the first element.

/// Three stations in API order, one without coordinates.
#[cfg(test)]
pub(crate) fn fixture_stations_json() -> &'static str {
    r#"{
      "@context": "http://environment.data.gov.uk/flood-monitoring/meta/context.jsonld",
      "meta": { "publisher": "Environment Agency", "version": "0.9", "hasFormat": [] },
      "items": [
        {
          "@id": "http://environment.data.gov.uk/flood-monitoring/id/stations/1491TH",
          "label": "Thames at X",
          "notation": "1491TH",
          "riverName": "River Thames",
          "lat": 51.5,
          "long": -0.1
        },
        {
          "@id": "http://environment.data.gov.uk/flood-monitoring/id/stations/E2043",
          "label": "Surfleet Sluice",
          "notation": "E2043",
          "riverName": "River Glen",
          "lat": 52.845991,
          "long": -0.100848
        },
        {
          "@id": "http://environment.data.gov.uk/flood-monitoring/id/stations/52119",
          "label": "Gaw Bridge",
          "notation": "52119"
        }
      ]
    }"#
}

/// Station records exercising the awkward shapes: array-valued label and
/// coordinates, a duplicate notation, and an item with no notation at all.
#[cfg(test)]
pub(crate) fn fixture_irregular_stations_json() -> &'static str {
    r#"{
      "items": [
        {
          "label": ["Kirkby Thore", "Kirkby Thore Bridge"],
          "notation": "760502",
          "lat": [54.62, 54.621],
          "long": [-2.56, -2.561]
        },
        { "label": "Kirkby Thore (duplicate)", "notation": "760502", "lat": 1.0, "long": 1.0 },
        { "label": "Orphan record without notation", "lat": 50.0, "long": 0.0 },
        { "notation": "L1931", "lat": "not-a-number", "long": -1.5 }
      ]
    }"#
}

/// Measures for 1491TH: stage level and flow.
#[cfg(test)]
pub(crate) fn fixture_measures_json() -> &'static str {
    r#"{
      "items": [
        {
          "@id": "http://environment.data.gov.uk/flood-monitoring/id/measures/1491TH-level-stage-i-15_min-mASD",
          "label": "Thames at X - level-stage-i-15_min-mASD",
          "notation": "1491TH-level-stage-i-15_min-mASD",
          "parameter": "level",
          "parameterName": "Water Level",
          "qualifier": "Stage",
          "unitName": "mASD"
        },
        {
          "@id": "http://environment.data.gov.uk/flood-monitoring/id/measures/1491TH-flow--i-15_min-m3_s",
          "label": "Thames at X - flow--i-15_min-m3_s",
          "notation": "1491TH-flow--i-15_min-m3_s",
          "parameter": "flow",
          "parameterName": "Flow"
        }
      ]
    }"#
}

/// A single reading, the minimal end-to-end case.
#[cfg(test)]
pub(crate) fn fixture_single_reading_json() -> &'static str {
    r#"{"items":[{"dateTime":"2024-01-01T00:00:00Z","value":1.23}]}"#
}

/// Sorted 15-minute readings with one null and one string value mixed in.
/// Only the three numeric rows should survive normalization.
#[cfg(test)]
pub(crate) fn fixture_mixed_readings_json() -> &'static str {
    r#"{
      "items": [
        {
          "@id": "http://environment.data.gov.uk/flood-monitoring/data/readings/1491TH-level-stage-i-15_min-mASD/2024-05-01T12-00-00Z",
          "dateTime": "2024-05-01T12:00:00Z",
          "measure": "http://environment.data.gov.uk/flood-monitoring/id/measures/1491TH-level-stage-i-15_min-mASD",
          "value": 0.412
        },
        {
          "dateTime": "2024-05-01T12:15:00Z",
          "measure": "http://environment.data.gov.uk/flood-monitoring/id/measures/1491TH-level-stage-i-15_min-mASD",
          "value": null
        },
        {
          "dateTime": "2024-05-01T12:30:00Z",
          "measure": "http://environment.data.gov.uk/flood-monitoring/id/measures/1491TH-level-stage-i-15_min-mASD",
          "value": 0.418
        },
        {
          "dateTime": "2024-05-01T12:45:00Z",
          "measure": "http://environment.data.gov.uk/flood-monitoring/id/measures/1491TH-level-stage-i-15_min-mASD",
          "value": "n/a"
        },
        {
          "dateTime": "2024-05-01T13:00:00Z",
          "measure": "http://environment.data.gov.uk/flood-monitoring/id/measures/1491TH-level-stage-i-15_min-mASD",
          "value": 0.425
        }
      ]
    }"#
}

/// Valid envelope with metadata but no `items` key at all.
#[cfg(test)]
pub(crate) fn fixture_missing_items_json() -> &'static str {
    r#"{ "meta": { "publisher": "Environment Agency", "version": "0.9" } }"#
}
