use serde_json::{Value, json};
use uuid::Uuid;

use sensorthings::{
    Datastream, EntityService, Error, FeatureOfInterest, Geometry, HistoricalLocation,
    InMemoryDataStore, Location, Observation, ObservationResult, ObservationType,
    ObservedProperty, Sensor, ServiceConfig, Thing, find,
};

struct Graph {
    service: EntityService<InMemoryDataStore>,
    thing: Thing,
    location: Location,
    sensor: Sensor,
    property: ObservedProperty,
    datastream: Datastream,
    feature: FeatureOfInterest,
    observation: Observation,
    historical_location: HistoricalLocation,
}

impl Graph {
    fn new(observation_type: ObservationType, result: Value) -> Self {
        let service = EntityService::new(InMemoryDataStore::new(), &ServiceConfig::default());
        let location: Location = service
            .create(&json!({
                "name": "roof",
                "description": "building 4 roof",
                "encodingType": "application/geo+json",
                "location": {"type": "Point", "coordinates": [-117.05, 51.05]},
            }))
            .unwrap();
        let thing: Thing = service
            .create(&json!({
                "name": "weather station",
                "description": "station on building 4",
                "properties": {"owner": "facilities"},
                "Locations": [{"@iot.id": location.id.to_string()}],
            }))
            .unwrap();
        let sensor: Sensor = service
            .create(&json!({
                "name": "DHT22",
                "description": "humidity and temperature",
                "encodingType": "application/pdf",
                "metadata": "http://example.org/dht22.pdf",
            }))
            .unwrap();
        let property: ObservedProperty = service
            .create(&json!({
                "name": "relative humidity",
                "definition": "http://dbpedia.org/page/Humidity",
                "description": "relative humidity of the air",
            }))
            .unwrap();
        let datastream: Datastream = service
            .create(&json!({
                "name": "roof humidity",
                "description": "humidity on the roof",
                "unitOfMeasurement": {
                    "name": "percent",
                    "symbol": "%",
                    "definition": "http://unitsofmeasure.org/ucum.html#para-29",
                },
                "observationType": observation_type.uri(),
                "Thing": {"@iot.id": thing.id.to_string()},
                "Sensor": {"@iot.id": sensor.id.to_string()},
                "ObservedProperty": {"@iot.id": property.id.to_string()},
            }))
            .unwrap();
        let feature: FeatureOfInterest = service
            .create(&json!({
                "name": "roof air",
                "description": "air above the roof",
                "encodingType": "application/geo+json",
                "feature": {"type": "Point", "coordinates": [-117.05, 51.05, 30.0]},
            }))
            .unwrap();
        let observation: Observation = service
            .create(&json!({
                "phenomenonTime": "2020-06-01T12:00:00Z",
                "result": result,
                "parameters": [{"calibrated": "yes"}],
                "Datastream": {"@iot.id": datastream.id.to_string()},
                "FeatureOfInterest": {"@iot.id": feature.id.to_string()},
            }))
            .unwrap();
        let historical_location: HistoricalLocation = service
            .create(&json!({
                "time": "2020-06-01T00:00:00Z",
                "Thing": {"@iot.id": thing.id.to_string()},
                "Locations": [{"@iot.id": location.id.to_string()}],
            }))
            .unwrap();
        Self {
            service,
            thing,
            location,
            sensor,
            property,
            datastream,
            feature,
            observation,
            historical_location,
        }
    }

    fn measurement() -> Self {
        Self::new(ObservationType::Measurement, json!(48.5))
    }

    /// Whether a patch of `document` against every kind would be persisted.
    fn persists(&self, document: &Value) -> Vec<bool> {
        let s = &self.service;
        vec![
            s.update::<Thing>(self.thing.id, document).unwrap().needs_persist(),
            s.update::<Location>(self.location.id, document).unwrap().needs_persist(),
            s.update::<Sensor>(self.sensor.id, document).unwrap().needs_persist(),
            s.update::<ObservedProperty>(self.property.id, document)
                .unwrap()
                .needs_persist(),
            s.update::<Datastream>(self.datastream.id, document)
                .unwrap()
                .needs_persist(),
            s.update::<FeatureOfInterest>(self.feature.id, document)
                .unwrap()
                .needs_persist(),
            s.update::<HistoricalLocation>(self.historical_location.id, document)
                .unwrap()
                .needs_persist(),
            s.update_observation(self.observation.id, document)
                .unwrap()
                .needs_persist(),
        ]
    }
}

#[test]
fn unrecognized_or_empty_documents_never_persist() {
    let graph = Graph::measurement();
    for document in [
        json!({}),
        json!({"colour": "blue", "serialNumber": 12}),
        json!({"name": null, "description": null}),
        json!({"@iot.id": Uuid::new_v4().to_string()}),
    ] {
        assert_eq!(graph.persists(&document), vec![false; 8], "{}", document);
    }
}

#[test]
fn same_values_never_persist() {
    let graph = Graph::measurement();
    let updated = graph
        .service
        .update::<Sensor>(
            graph.sensor.id,
            &json!({"name": "DHT22", "encodingType": "application/pdf"}),
        )
        .unwrap();
    assert!(!updated.needs_persist());
    let updated = graph
        .service
        .update_observation(
            graph.observation.id,
            &json!({"result": 48.5, "parameters": [{"calibrated": "yes"}]}),
        )
        .unwrap();
    assert!(!updated.needs_persist());
}

#[test]
fn changed_fields_are_persisted() {
    let graph = Graph::measurement();
    let updated = graph
        .service
        .update::<Location>(
            graph.location.id,
            &json!({"location": {"type": "Point", "coordinates": [-117.0, 51.0]}}),
        )
        .unwrap();
    assert!(updated.changes.contains("location"));
    let stored: Location = find(graph.service.store(), graph.location.id).unwrap();
    assert_eq!(stored.location, Geometry::point(-117.0, 51.0));
}

#[test]
fn thing_properties_merge() {
    let graph = Graph::measurement();
    graph
        .service
        .update::<Thing>(
            graph.thing.id,
            &json!({"properties": [{"owner": ""}, {"site": "north"}]}),
        )
        .unwrap();
    let stored: Thing = find(graph.service.store(), graph.thing.id).unwrap();
    assert_eq!(stored.properties.len(), 1);
    assert_eq!(stored.properties.get("site").map(String::as_str), Some("north"));
}

#[test]
fn invalid_patch_leaves_stored_entity_untouched() {
    let graph = Graph::measurement();
    let err = graph
        .service
        .update::<Datastream>(
            graph.datastream.id,
            &json!({"name": "renamed", "unitOfMeasurement": {"name": "percent", "symbol": "%"}}),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(_)));
    let stored: Datastream = find(graph.service.store(), graph.datastream.id).unwrap();
    assert_eq!(stored, graph.datastream);
}

#[test]
fn malformed_uri_is_invalid() {
    let graph = Graph::measurement();
    let Err(Error::Invalid(err)) = graph
        .service
        .update::<ObservedProperty>(graph.property.id, &json!({"definition": "humidity"}))
    else {
        panic!("malformed definition accepted");
    };
    assert_eq!(err.field.as_deref(), Some("definition"));
}

#[test]
fn measurement_results() {
    let graph = Graph::measurement();
    let updated = graph
        .service
        .update_observation(graph.observation.id, &json!({"result": 50}))
        .unwrap();
    assert_eq!(updated.entity.result, ObservationResult::Measurement(50.0));
    for bad in [json!(true), json!("50")] {
        assert!(
            graph
                .service
                .update_observation(graph.observation.id, &json!({"result": bad}))
                .is_err()
        );
    }
}

#[test]
fn count_results_reject_fractions() {
    let graph = Graph::new(ObservationType::CountObservation, json!(3));
    assert!(
        graph
            .service
            .update_observation(graph.observation.id, &json!({"result": 543.21}))
            .is_err()
    );
}

#[test]
fn category_results_require_uris() {
    let graph = Graph::new(
        ObservationType::CategoryObservation,
        json!("http://example.org/sky/clear"),
    );
    assert!(
        graph
            .service
            .update_observation(graph.observation.id, &json!({"result": "overcast"}))
            .is_err()
    );
    let updated = graph
        .service
        .update_observation(
            graph.observation.id,
            &json!({"result": "http://example.org/sky/overcast"}),
        )
        .unwrap();
    assert_eq!(
        updated.entity.result,
        ObservationResult::Category("http://example.org/sky/overcast".to_string())
    );
}

#[test]
fn observation_relations_stay_fixed() {
    let graph = Graph::measurement();
    let other = graph
        .service
        .create::<FeatureOfInterest>(&json!({
            "name": "street",
            "description": "street level",
            "encodingType": "application/geo+json",
            "feature": {"type": "Point", "coordinates": [-117.05, 51.04]},
        }))
        .unwrap();
    let updated = graph
        .service
        .update_observation(
            graph.observation.id,
            &json!({"FeatureOfInterest": {"@iot.id": other.id.to_string()}}),
        )
        .unwrap();
    assert!(!updated.needs_persist());
    let stored: Observation = find(graph.service.store(), graph.observation.id).unwrap();
    assert_eq!(stored.feature_of_interest_id, Some(graph.feature.id));
}

#[test]
fn datastream_reassociation() {
    let graph = Graph::measurement();
    let sensor = graph
        .service
        .create::<Sensor>(&json!({
            "name": "SHT31",
            "description": "replacement humidity sensor",
            "encodingType": "application/pdf",
            "metadata": "http://example.org/sht31.pdf",
        }))
        .unwrap();
    let updated = graph
        .service
        .update::<Datastream>(
            graph.datastream.id,
            &json!({"Sensor": {"@iot.id": sensor.id.to_string()}}),
        )
        .unwrap();
    assert!(updated.needs_persist());
    let stored: Datastream = find(graph.service.store(), graph.datastream.id).unwrap();
    assert_eq!(stored.sensor_id, sensor.id);
}

#[test]
fn observation_type_is_fixed_once_observed() {
    let graph = Graph::measurement();
    let truth = json!({"observationType": ObservationType::TruthObservation.uri()});
    let Err(Error::Invalid(err)) = graph
        .service
        .update::<Datastream>(graph.datastream.id, &truth)
    else {
        panic!("observationType changed under existing observations");
    };
    assert_eq!(err.field.as_deref(), Some("observationType"));
    let stored: Datastream = find(graph.service.store(), graph.datastream.id).unwrap();
    assert_eq!(stored.observation_type, ObservationType::Measurement);

    let same = json!({"observationType": ObservationType::Measurement.uri(), "name": "renamed"});
    let updated = graph
        .service
        .update::<Datastream>(graph.datastream.id, &same)
        .unwrap();
    assert!(updated.needs_persist());
    assert!(!updated.changes.contains("observationType"));
}

#[test]
fn observation_type_of_empty_stream_may_change() {
    let graph = Graph::measurement();
    let empty: Datastream = graph
        .service
        .create(&json!({
            "name": "roof pressure",
            "description": "no readings yet",
            "unitOfMeasurement": {
                "name": "hectopascal",
                "symbol": "hPa",
                "definition": "http://unitsofmeasure.org/ucum.html#para-30",
            },
            "observationType": ObservationType::Measurement.uri(),
            "Thing": {"@iot.id": graph.thing.id.to_string()},
            "Sensor": {"@iot.id": graph.sensor.id.to_string()},
            "ObservedProperty": {"@iot.id": graph.property.id.to_string()},
        }))
        .unwrap();
    let updated = graph
        .service
        .update::<Datastream>(
            empty.id,
            &json!({"observationType": ObservationType::CountObservation.uri()}),
        )
        .unwrap();
    assert!(updated.changes.contains("observationType"));
    let stored: Datastream = find(graph.service.store(), empty.id).unwrap();
    assert_eq!(stored.observation_type, ObservationType::CountObservation);
}

#[test]
fn replacement_cannot_retype_observed_stream() {
    let graph = Graph::measurement();
    let document = |observation_type: ObservationType| {
        json!({
            "name": "roof humidity",
            "description": "humidity on the roof",
            "unitOfMeasurement": {
                "name": "percent",
                "symbol": "%",
                "definition": "http://unitsofmeasure.org/ucum.html#para-29",
            },
            "observationType": observation_type.uri(),
            "Thing": {"@iot.id": graph.thing.id.to_string()},
            "Sensor": {"@iot.id": graph.sensor.id.to_string()},
            "ObservedProperty": {"@iot.id": graph.property.id.to_string()},
        })
    };
    let err = graph
        .service
        .replace::<Datastream>(
            graph.datastream.id,
            &document(ObservationType::CategoryObservation),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Invalid(ref e) if e.field.as_deref() == Some("observationType")));
    let replaced = graph
        .service
        .replace::<Datastream>(graph.datastream.id, &document(ObservationType::Measurement))
        .unwrap();
    assert_eq!(replaced.observation_type, ObservationType::Measurement);
}
