use schem_eda::SearchConfig;
use schem_sch::components::{ComponentSpec, add_component, search_components};
use schem_sch::inspect::{InspectOptions, inspect};
use schem_sch::netlist::{ConnectivityOptions, generate_netlist, unconnected_pins};
use schem_sch::{Config, Document, Error, NotFound, PinResolver, Point, SymbolInjector, TemplateSource};
use schem_sexpr::Sexpr;
use schem_sexpr::kicad::symbol::symbol_name;
use schem_test_utils::fixtures::{CONN_01X02, device_library, symbol_library};
use schem_test_utils::{Instance, Sandbox, SchematicBuilder};

fn sandbox_config(sb: &Sandbox) -> Config {
    Config {
        library: SearchConfig {
            symbol_dirs: vec![sb.symbol_dir().to_path_buf()],
            use_environment: false,
            use_default_dirs: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn definition_names(doc: &Document) -> Vec<String> {
    doc.lib_symbols()
        .unwrap()
        .iter()
        .filter_map(Sexpr::as_list)
        .filter_map(symbol_name)
        .collect()
}

#[test]
fn test_device_r_end_to_end() {
    let _ = env_logger::builder().is_test(true).try_init();
    let sb = Sandbox::new();
    sb.write_library("Device", &device_library());
    let path = sb.write_schematic("demo.kicad_sch", &SchematicBuilder::new().build());
    let injector = SymbolInjector::from_config(&sandbox_config(&sb));

    let mut doc = Document::load(&path).unwrap();
    let template = injector.get_or_create_template(&mut doc, "R", None).unwrap();
    assert_eq!(template.reference, "_TEMPLATE_Device_R");
    assert_eq!(template.source, TemplateSource::Injected);

    let spec = ComponentSpec::new("R1", "4k7", Point::new(50.8, 50.8));
    add_component(&mut doc, &template.reference, &spec).unwrap();
    doc.save(&path).unwrap();

    let doc = Document::load(&path).unwrap();
    assert_eq!(definition_names(&doc), vec!["Device:R"]);
    let template = doc.instance("_TEMPLATE_Device_R").unwrap();
    assert!(template.dnp && !template.in_bom && !template.on_board);
    assert_eq!(template.position, Point::new(-100.0, -100.0));

    let resolver = PinResolver::default();
    let pin1 = resolver.pin_location(&doc, "R1", "1").unwrap();
    let pin2 = resolver.pin_location(&doc, "R1", "2").unwrap();
    assert!(pin1.coincides(Point::new(50.8, 54.61), 1e-9));
    assert!(pin2.coincides(Point::new(50.8, 46.99), 1e-9));
}

#[test]
fn test_injection_is_idempotent() {
    let sb = Sandbox::new();
    sb.write_library("Device", &device_library());
    let injector = SymbolInjector::from_config(&sandbox_config(&sb));
    let mut doc = Document::parse(&SchematicBuilder::new().build()).unwrap();
    let first = injector
        .get_or_create_template(&mut doc, "C", None)
        .unwrap();
    let text = doc.serialize();

    for _ in 0..3 {
        let again = injector
            .get_or_create_template(&mut doc, "C", None)
            .unwrap();
        assert_eq!(again.reference, first.reference);
        assert_eq!(again.source, TemplateSource::Cached);
    }
    injector.load_symbol(&mut doc, "Device", "C").unwrap();
    assert_eq!(doc.serialize(), text);
    assert_eq!(definition_names(&doc), vec!["Device:C"]);

    // The same document reparsed still finds its template.
    let mut reparsed = Document::parse(&text).unwrap();
    let cached = injector.get_or_create_template(&mut reparsed, "C", None).unwrap();
    assert_eq!(cached.source, TemplateSource::Cached);
    assert_eq!(reparsed.serialize(), text);
}

#[test]
fn test_derived_symbols_are_flattened_and_stacked() {
    let sb = Sandbox::new();
    sb.write_library("Device", &device_library());
    let injector = SymbolInjector::from_config(&sandbox_config(&sb));
    let mut doc = Document::parse(&SchematicBuilder::new().build()).unwrap();

    injector.get_or_create_template(&mut doc, "R", None).unwrap();
    let us = injector.get_or_create_template(&mut doc, "R_US", None).unwrap();
    assert_eq!(us.reference, "_TEMPLATE_Device_R_US");

    let doc = Document::parse(&doc.serialize()).unwrap();
    assert_eq!(definition_names(&doc), vec!["Device:R", "Device:R_US"]);
    let template = doc.instance("_TEMPLATE_Device_R_US").unwrap();
    assert_eq!(template.position, Point::new(-100.0, -110.0));
    assert_eq!(template.footprint, "Resistor_SMD:R_0603_1608Metric");
    assert_eq!(template.value, "R_US");

    let pins = PinResolver::default()
        .all_pin_locations(&doc, "_TEMPLATE_Device_R_US")
        .unwrap();
    assert_eq!(pins.len(), 2);
}

#[test]
fn test_static_templates_are_reused() {
    let sb = Sandbox::new();
    let injector = SymbolInjector::from_config(&sandbox_config(&sb));
    let text = SchematicBuilder::new()
        .with_device_symbols()
        .instance(Instance::new("Device:R", "_TEMPLATE_R", "R", (-100.0, -100.0)).template())
        .build();
    let mut doc = Document::parse(&text).unwrap();

    let template = injector.get_or_create_template(&mut doc, "R", None).unwrap();
    assert_eq!(template.reference, "_TEMPLATE_R");
    assert_eq!(template.source, TemplateSource::Static);
    assert_eq!(doc.serialize(), text);
}

#[test]
fn test_missing_library_leaves_document_untouched() {
    let sb = Sandbox::new();
    let injector = SymbolInjector::from_config(&sandbox_config(&sb));
    let text = SchematicBuilder::new().build();
    let mut doc = Document::parse(&text).unwrap();

    match injector.get_or_create_template(&mut doc, "Q_NPN_BCE", Some("Transistor_BJT")) {
        Err(Error::NotFound(NotFound::Library { library, attempted })) => {
            assert_eq!(library, "Transistor_BJT");
            assert_eq!(attempted, vec![sb.symbol_dir().join("Transistor_BJT.kicad_sym")]);
        }
        other => panic!("expected a missing library, got {other:?}"),
    }
    assert_eq!(doc.serialize(), text);
}

#[test]
fn test_named_library_and_symbol() {
    let sb = Sandbox::new();
    sb.write_library("Connector_Generic", &symbol_library(&[CONN_01X02]));
    let injector = SymbolInjector::from_config(&sandbox_config(&sb));
    assert_eq!(
        injector.symbols_in("Connector_Generic").unwrap(),
        vec!["Conn_01x02"]
    );

    let mut doc = Document::parse(&SchematicBuilder::new().build()).unwrap();
    let template = injector
        .get_or_create_template(&mut doc, "Conn_01x02", Some("Connector_Generic"))
        .unwrap();
    assert_eq!(template.reference, "_TEMPLATE_Connector_Generic_Conn_01x02");
    assert_eq!(definition_names(&doc), vec!["Connector_Generic:Conn_01x02"]);

    let pins = PinResolver::default()
        .all_pin_locations(&doc, &template.reference)
        .unwrap();
    let numbers: Vec<&str> = pins.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(numbers, vec!["1", "2"]);
    assert!(pins[1].1.coincides(Point::new(-105.08, -102.54), 1e-9));
}

#[test]
fn test_custom_template_prefix_stays_out_of_connectivity() {
    let sb = Sandbox::new();
    sb.write_library("Device", &device_library());
    let mut config = sandbox_config(&sb);
    config.templates.prefix = "_TPL".to_string();
    let injector = SymbolInjector::from_config(&config);

    let mut doc = Document::parse(&SchematicBuilder::new().build()).unwrap();
    let template = injector.get_or_create_template(&mut doc, "R", None).unwrap();
    assert_eq!(template.reference, "_TPL_Device_R");
    add_component(
        &mut doc,
        &template.reference,
        &ComponentSpec::new("R1", "1k", Point::new(10.0, 10.0)),
    )
    .unwrap();

    let resolver = PinResolver::default();
    let options = ConnectivityOptions::from(&config);
    let open: Vec<String> = unconnected_pins(&doc, &resolver, &options)
        .into_iter()
        .map(|u| format!("{}.{}", u.reference, u.pin))
        .collect();
    assert_eq!(open, vec!["R1.1", "R1.2"]);

    let netlist = generate_netlist(&doc, &resolver, &options);
    assert_eq!(netlist.components.len(), 1);
    assert_eq!(netlist.components[0].reference, "R1");

    let report = inspect(&doc, &resolver, &InspectOptions::from(&config)).unwrap();
    assert_eq!(report.summary.component_count, 1);

    let found: Vec<String> = search_components(&doc, "device:r", &config.templates.prefix)
        .into_iter()
        .map(|inst| inst.reference)
        .collect();
    assert_eq!(found, vec!["R1"]);
}
