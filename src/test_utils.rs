#[cfg(test)]
pub mod test_helpers {
    use serde_json::json;

    use crate::{
        Datastream, EntityService, InMemoryDataStore, ObservationType, ObservedProperty, Sensor,
        ServiceConfig, Thing,
    };

    /// Creates a service over a fresh in-memory store with the default config
    pub fn test_service() -> EntityService<InMemoryDataStore> {
        EntityService::new(InMemoryDataStore::new(), &ServiceConfig::default())
    }

    /// Creates a Thing, Sensor, ObservedProperty and a Datastream of `observation_type` over them
    pub fn seed_datastream(
        service: &EntityService<InMemoryDataStore>,
        observation_type: ObservationType,
    ) -> Datastream {
        let thing: Thing = service
            .create(&json!({"name": "weather station", "description": "roof"}))
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
                "name": "air temperature",
                "definition": "http://dbpedia.org/page/Temperature",
                "description": "temperature of the air",
            }))
            .unwrap();
        service
            .create(&json!({
                "name": format!("{} stream", observation_type.code()),
                "description": "test datastream",
                "unitOfMeasurement": {
                    "name": "degree Celsius",
                    "symbol": "°C",
                    "definition": "http://unitsofmeasure.org/ucum.html#para-30",
                },
                "observationType": observation_type.uri(),
                "Thing": {"@iot.id": thing.id.to_string()},
                "Sensor": {"@iot.id": sensor.id.to_string()},
                "ObservedProperty": {"@iot.id": property.id.to_string()},
            }))
            .unwrap()
    }
}
