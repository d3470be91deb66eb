use schem_sch::{Document, Error, NotFound, PinResolver, Point};
use schem_test_utils::{Instance, SchematicBuilder};

fn assert_at(actual: Point, x: f64, y: f64) {
    assert!(
        actual.coincides(Point::new(x, y), 1e-6),
        "expected ({x}, {y}), got ({}, {})",
        actual.x,
        actual.y
    );
}

fn placed(instance: Instance) -> Document {
    let text = SchematicBuilder::new()
        .with_device_symbols()
        .instance(instance)
        .build();
    Document::parse(&text).unwrap()
}

#[test]
fn test_quarter_turns() {
    let cases = [
        (0.0, (100.0, 103.81), (100.0, 96.19)),
        (90.0, (96.19, 100.0), (103.81, 100.0)),
        (180.0, (100.0, 96.19), (100.0, 103.81)),
        (270.0, (103.81, 100.0), (96.19, 100.0)),
    ];
    let resolver = PinResolver::default();
    for (rotation, pin1, pin2) in cases {
        let doc = placed(Instance::new("Device:R", "R1", "1k", (100.0, 100.0)).rotated(rotation));
        let pins = resolver.all_pin_locations(&doc, "R1").unwrap();
        assert_eq!(pins.len(), 2);
        assert_eq!(pins[0].0, "1");
        assert_at(pins[0].1, pin1.0, pin1.1);
        assert_at(pins[1].1, pin2.0, pin2.1);
    }
}

#[test]
fn test_rotated_pin_moves_left() {
    let doc = placed(Instance::new("Device:R", "R1", "1k", (10.0, 10.0)).rotated(90.0));
    let pin = PinResolver::default().pin_location(&doc, "R1", "1").unwrap();
    assert_at(pin, 10.0 - 3.81, 10.0);
}

#[test]
fn test_mirrored_symbols() {
    let resolver = PinResolver::default();

    let doc = placed(Instance::new("Device:R", "R1", "1k", (10.0, 10.0)).mirrored('x'));
    assert_at(resolver.pin_location(&doc, "R1", "1").unwrap(), 10.0, 6.19);

    let doc = placed(Instance::new("Device:LED", "D1", "red", (10.0, 10.0)).mirrored('y'));
    assert_at(resolver.pin_location(&doc, "D1", "1").unwrap(), 13.81, 10.0);
    assert_at(resolver.pin_location(&doc, "D1", "2").unwrap(), 6.19, 10.0);

    // Mirroring applies after the rotation.
    let doc = placed(
        Instance::new("Device:R", "R1", "1k", (0.0, 0.0))
            .rotated(90.0)
            .mirrored('y'),
    );
    assert_at(resolver.pin_location(&doc, "R1", "1").unwrap(), 3.81, 0.0);
}

#[test]
fn test_lookup_failures() {
    let resolver = PinResolver::default();
    let doc = placed(Instance::new("Device:R", "R1", "1k", (0.0, 0.0)));

    match resolver.pin_location(&doc, "R1", "3") {
        Err(Error::NotFound(NotFound::Pin { pin, available, .. })) => {
            assert_eq!(pin, "3");
            assert_eq!(available, vec!["1", "2"]);
        }
        other => panic!("expected a missing pin, got {other:?}"),
    }
    assert!(matches!(
        resolver.pin_location(&doc, "R7", "1"),
        Err(Error::NotFound(NotFound::Instance(_)))
    ));

    let doc = placed(Instance::new("Sensor:BME280", "U1", "BME280", (0.0, 0.0)));
    assert!(matches!(
        resolver.pin_location(&doc, "U1", "1"),
        Err(Error::NotFound(NotFound::Definition(_)))
    ));
}

#[test]
fn test_cache_follows_document_content() {
    let resolver = PinResolver::default();
    let doc = placed(Instance::new("Device:R", "R1", "1k", (0.0, 0.0)));
    resolver.pin_location(&doc, "R1", "1").unwrap();
    resolver.pin_location(&doc, "R1", "2").unwrap();
    assert_eq!(resolver.len(), 1);

    let other = placed(Instance::new("Device:C", "C1", "100n", (0.0, 0.0)));
    resolver.pin_location(&other, "C1", "1").unwrap();
    assert_eq!(resolver.len(), 2);

    resolver.invalidate(&doc);
    assert_eq!(resolver.len(), 1);
    resolver.clear();
    assert!(resolver.is_empty());
}
