use serde_json::{Value, json};
use uuid::Uuid;

use sensorthings::{
    DataStore, Datastream, ERROR_SENTINEL, EntityKind, EntityService, Error, FeatureOfInterest,
    InMemoryDataStore, Observation, ObservationResult, ObservationType, ObservedProperty, Sensor,
    ServiceConfig, Thing, find,
};

/// A service with one Thing, Sensor and ObservedProperty to hang Datastreams off.
struct SensorFixture {
    service: EntityService<InMemoryDataStore>,
    thing: Thing,
    sensor: Sensor,
    property: ObservedProperty,
}

impl SensorFixture {
    fn new() -> Self {
        let service = EntityService::new(
            InMemoryDataStore::new(),
            &ServiceConfig::new("https://sensors.example.org", "v1.1"),
        );
        let thing = service
            .create(&json!({"name": "buoy 7", "description": "harbour entrance"}))
            .unwrap();
        let sensor = service
            .create(&json!({
                "name": "multi-probe",
                "description": "water quality probe",
                "encodingType": "http://www.opengis.net/doc/IS/SensorML/2.0",
                "metadata": "http://example.org/probe.xml",
            }))
            .unwrap();
        let property = service
            .create(&json!({
                "name": "water quality",
                "definition": "http://example.org/water-quality",
                "description": "assorted water quality readings",
            }))
            .unwrap();
        Self {
            service,
            thing,
            sensor,
            property,
        }
    }

    fn datastream(&self, observation_type: ObservationType) -> Datastream {
        self.service
            .create(&json!({
                "name": observation_type.code(),
                "description": "stream under test",
                "unitOfMeasurement": {
                    "name": "unitless",
                    "symbol": "",
                    "definition": "http://example.org/unitless",
                },
                "observationType": observation_type.uri(),
                "Thing": {"@iot.id": self.thing.id.to_string()},
                "Sensor": {"@iot.id": self.sensor.id.to_string()},
                "ObservedProperty": {"@iot.id": self.property.id.to_string()},
            }))
            .unwrap()
    }

    fn feature(&self) -> FeatureOfInterest {
        self.service
            .create(&json!({
                "name": "harbour",
                "description": "harbour basin",
                "encodingType": "application/vnd.geo+json",
                "feature": {"type": "Point", "coordinates": [10.0, 53.5]},
            }))
            .unwrap()
    }

    fn observations(&self) -> Vec<Observation> {
        self.service
            .store()
            .list(EntityKind::Observation)
            .unwrap()
            .into_iter()
            .map(|e| Observation::try_from(e).unwrap())
            .collect()
    }
}

fn element(datastream: &Datastream, components: &[&str], rows: Vec<Value>) -> Value {
    let count = rows.len();
    json!({
        "Datastream": {"@iot.id": datastream.id.to_string()},
        "components": components,
        "dataArray@iot.count": count,
        "dataArray": rows,
    })
}

/// One row per result shape: real, integer, boolean, URI string, plain string.
fn five_rows() -> Vec<Value> {
    vec![
        json!(["2017-01-13T10:20:00Z", 23.5]),
        json!(["2017-01-13T10:21:00Z", 42]),
        json!(["2017-01-13T10:22:00Z", true]),
        json!(["2017-01-13T10:23:00Z", "http://example.org/category/clear"]),
        json!(["2017-01-13T10:24:00Z", "murky"]),
    ]
}

fn succeeded(outcomes: &[String]) -> Vec<bool> {
    outcomes.iter().map(|o| o != ERROR_SENTINEL).collect()
}

#[test]
fn five_row_fixture_accepts_only_matching_results() {
    let expectations = [
        (ObservationType::Measurement, [true, true, false, false, false]),
        (ObservationType::CountObservation, [false, true, false, false, false]),
        (ObservationType::TruthObservation, [false, false, true, false, false]),
        (ObservationType::CategoryObservation, [false, false, false, true, false]),
        (ObservationType::Observation, [false, false, false, true, true]),
    ];
    for (observation_type, expected) in expectations {
        let fixture = SensorFixture::new();
        let datastream = fixture.datastream(observation_type);
        let body = json!([element(&datastream, &["phenomenonTime", "result"], five_rows())]);
        let outcomes = fixture.service.ingest_data_array(&body).unwrap();
        assert_eq!(outcomes.len(), 5, "{}", observation_type);
        assert_eq!(succeeded(&outcomes), expected, "{}", observation_type);
        let created = expected.iter().filter(|ok| **ok).count();
        assert_eq!(fixture.observations().len(), created, "{}", observation_type);
    }
}

#[test]
fn outcomes_are_self_links() {
    let fixture = SensorFixture::new();
    let datastream = fixture.datastream(ObservationType::Measurement);
    let body = json!([element(
        &datastream,
        &["phenomenonTime", "result"],
        vec![json!(["2017-01-13T10:20:00Z", 23.5])],
    )]);
    let outcomes = fixture.service.ingest_data_array(&body).unwrap();
    let link = &outcomes[0];
    let id = link
        .strip_prefix("https://sensors.example.org/v1.1/Observations(")
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap();
    let observation: Observation = find(fixture.service.store(), Uuid::parse_str(id).unwrap()).unwrap();
    assert_eq!(observation.datastream_id, datastream.id);
    assert_eq!(observation.result, ObservationResult::Measurement(23.5));
    assert_eq!(observation.result_time, None);
}

#[test]
fn wrong_kind_row_is_isolated() {
    let fixture = SensorFixture::new();
    let datastream = fixture.datastream(ObservationType::Measurement);
    let body = json!([element(
        &datastream,
        &["phenomenonTime", "result"],
        vec![
            json!(["2017-01-13T10:20:00Z", 23.5]),
            json!(["2017-01-13T10:21:00Z", "warm"]),
        ],
    )]);
    let outcomes = fixture.service.ingest_data_array(&body).unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].contains("/Observations("));
    assert_eq!(outcomes[1], ERROR_SENTINEL);
}

#[test]
fn count_mismatch_fails_whole_element_before_any_row() {
    let fixture = SensorFixture::new();
    let datastream = fixture.datastream(ObservationType::Measurement);
    let mut bad = element(
        &datastream,
        &["phenomenonTime", "result"],
        vec![
            json!(["2017-01-13T10:20:00Z", 1.0]),
            json!(["2017-01-13T10:21:00Z", 2.0]),
            json!(["2017-01-13T10:22:00Z", 3.0]),
        ],
    );
    bad["dataArray@iot.count"] = json!(2);
    let good = element(
        &datastream,
        &["phenomenonTime", "result"],
        vec![json!(["2017-01-13T10:20:00Z", 1.0])],
    );
    let err = fixture
        .service
        .ingest_data_array(&json!([good, bad]))
        .unwrap_err();
    let Error::Invalid(err) = err else {
        panic!("expected invalid, got {:?}", err);
    };
    assert_eq!(err.field.as_deref(), Some("dataArray@iot.count"));
    assert!(fixture.observations().is_empty());
}

#[test]
fn count_alias_is_accepted() {
    let fixture = SensorFixture::new();
    let datastream = fixture.datastream(ObservationType::TruthObservation);
    let body = json!([{
        "Datastream": {"@iot.id": datastream.id.to_string()},
        "components": ["phenomenonTime", "result"],
        "count": 1,
        "dataArray": [["2017-01-13T10:20:00Z", false]],
    }]);
    let outcomes = fixture.service.ingest_data_array(&body).unwrap();
    assert_ne!(outcomes[0], ERROR_SENTINEL);
}

#[test]
fn missing_required_component_fails_element() {
    let fixture = SensorFixture::new();
    let datastream = fixture.datastream(ObservationType::Measurement);
    let body = json!([element(&datastream, &["result"], vec![json!([1.0])])]);
    let Err(Error::Invalid(err)) = fixture.service.ingest_data_array(&body) else {
        panic!("missing phenomenonTime accepted");
    };
    assert!(err.reason.contains("phenomenonTime"));
}

#[test]
fn unsupported_component_fails_element() {
    let fixture = SensorFixture::new();
    let datastream = fixture.datastream(ObservationType::Measurement);
    let body = json!([element(
        &datastream,
        &["phenomenonTime", "result", "resultQuality"],
        vec![json!(["2017-01-13T10:20:00Z", 1.0, "good"])],
    )]);
    assert!(matches!(
        fixture.service.ingest_data_array(&body),
        Err(Error::Invalid(_))
    ));
}

#[test]
fn unknown_datastream_is_not_found() {
    let fixture = SensorFixture::new();
    let body = json!([{
        "Datastream": {"@iot.id": Uuid::new_v4().to_string()},
        "components": ["phenomenonTime", "result"],
        "dataArray@iot.count": 1,
        "dataArray": [["2017-01-13T10:20:00Z", 1.0]],
    }]);
    let err = fixture.service.ingest_data_array(&body).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn row_failures_cover_time_length_and_references() {
    let fixture = SensorFixture::new();
    let datastream = fixture.datastream(ObservationType::Measurement);
    let feature = fixture.feature();
    let body = json!([element(
        &datastream,
        &["phenomenonTime", "result", "FeatureOfInterest/id"],
        vec![
            json!(["2017-01-13T10:20:00Z", 1.0, feature.id.to_string()]),
            json!(["yesterday", 2.0, feature.id.to_string()]),
            json!(["2017-01-13T10:22:00Z", 3.0]),
            json!(["2017-01-13T10:23:00Z", 4.0, Uuid::new_v4().to_string()]),
            json!(["2017-01-13T10:24:00Z", null, feature.id.to_string()]),
            json!(["2017-01-13T10:25:00Z", 6.0, 17]),
        ],
    )]);
    let outcomes = fixture.service.ingest_data_array(&body).unwrap();
    assert_eq!(succeeded(&outcomes), vec![true, false, false, false, false, false]);
    let observations = fixture.observations();
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].feature_of_interest_id, Some(feature.id));
}

#[test]
fn intervals_and_parameters_are_decoded() {
    let fixture = SensorFixture::new();
    let datastream = fixture.datastream(ObservationType::CountObservation);
    let body = json!([element(
        &datastream,
        &["phenomenonTime", "result", "parameters"],
        vec![
            json!([
                "2017-01-13T10:20:00+01:00/2017-01-13T10:30:00+01:00",
                7,
                {"battery": "low", "retries": 2}
            ]),
            json!(["2017-01-13T10:30:00Z", 8, "battery=low"]),
            json!(["2017-01-13T10:40:00Z", 9, {"nested": {"a": "b"}}]),
        ],
    )]);
    let outcomes = fixture.service.ingest_data_array(&body).unwrap();
    assert_eq!(succeeded(&outcomes), vec![true, false, false]);
    let observation = &fixture.observations()[0];
    assert_eq!(
        observation.phenomenon_time.to_string(),
        "2017-01-13T09:20:00Z/2017-01-13T09:30:00Z"
    );
    assert_eq!(observation.result, ObservationResult::Count(7));
    assert_eq!(observation.parameters.get("retries").map(String::as_str), Some("2"));
}

#[test]
fn outcomes_concatenate_across_elements_in_order() {
    let fixture = SensorFixture::new();
    let truth = fixture.datastream(ObservationType::TruthObservation);
    let text = fixture.datastream(ObservationType::Observation);
    let body = json!([
        element(
            &truth,
            &["result", "phenomenonTime"],
            vec![
                json!([true, "2017-01-13T10:20:00Z"]),
                json!(["true", "2017-01-13T10:21:00Z"]),
            ],
        ),
        element(
            &text,
            &["phenomenonTime", "result"],
            vec![
                json!(["2017-01-13T10:20:00Z", 1]),
                json!(["2017-01-13T10:21:00Z", "calm"]),
            ],
        ),
    ]);
    let outcomes = fixture.service.ingest_data_array(&body).unwrap();
    assert_eq!(succeeded(&outcomes), vec![true, false, false, true]);
}

#[test]
fn body_must_be_an_array() {
    let fixture = SensorFixture::new();
    assert!(matches!(
        fixture.service.ingest_data_array(&json!({"dataArray": []})),
        Err(Error::Invalid(_))
    ));
}
