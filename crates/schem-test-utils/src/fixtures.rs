//! Text fixtures in the layout eeschema writes.

/// `Device:R`: pin 1 at (0, 3.81), pin 2 at (0, -3.81).
pub const RESISTOR: &str = r#"(symbol "R"
		(pin_numbers hide)
		(pin_names
			(offset 0)
		)
		(exclude_from_sim no)
		(in_bom yes)
		(on_board yes)
		(property "Reference" "R"
			(at 2.032 0 90)
			(effects
				(font
					(size 1.27 1.27)
				)
			)
		)
		(property "Value" "R"
			(at 0 0 90)
			(effects
				(font
					(size 1.27 1.27)
				)
			)
		)
		(property "Footprint" ""
			(at -1.778 0 90)
			(effects
				(font
					(size 1.27 1.27)
				)
				(hide yes)
			)
		)
		(property "Datasheet" "~"
			(at 0 0 0)
			(effects
				(font
					(size 1.27 1.27)
				)
				(hide yes)
			)
		)
		(symbol "R_0_1"
			(rectangle
				(start -1.016 -2.54)
				(end 1.016 2.54)
				(stroke
					(width 0.254)
					(type default)
				)
				(fill
					(type none)
				)
			)
		)
		(symbol "R_1_1"
			(pin passive line
				(at 0 3.81 270)
				(length 1.27)
				(name "~"
					(effects
						(font
							(size 1.27 1.27)
						)
					)
				)
				(number "1"
					(effects
						(font
							(size 1.27 1.27)
						)
					)
				)
			)
			(pin passive line
				(at 0 -3.81 90)
				(length 1.27)
				(name "~"
					(effects
						(font
							(size 1.27 1.27)
						)
					)
				)
				(number "2"
					(effects
						(font
							(size 1.27 1.27)
						)
					)
				)
			)
		)
	)"#;

/// `Device:C`: pin 1 at (0, 3.81), pin 2 at (0, -3.81).
pub const CAPACITOR: &str = r#"(symbol "C"
		(pin_numbers hide)
		(in_bom yes)
		(on_board yes)
		(property "Reference" "C" (at 0.635 2.54 0) (effects (font (size 1.27 1.27)) (justify left)))
		(property "Value" "C" (at 0.635 -2.54 0) (effects (font (size 1.27 1.27)) (justify left)))
		(property "Footprint" "" (at 0.9652 -3.81 0) (effects (font (size 1.27 1.27)) (hide yes)))
		(property "Datasheet" "~" (at 0 0 0) (effects (font (size 1.27 1.27)) (hide yes)))
		(symbol "C_0_1"
			(polyline (pts (xy -2.032 -0.762) (xy 2.032 -0.762)) (stroke (width 0.508) (type default)) (fill (type none)))
			(polyline (pts (xy -2.032 0.762) (xy 2.032 0.762)) (stroke (width 0.508) (type default)) (fill (type none)))
		)
		(symbol "C_1_1"
			(pin passive line (at 0 3.81 270) (length 2.794) (name "~" (effects (font (size 1.27 1.27)))) (number "1" (effects (font (size 1.27 1.27)))))
			(pin passive line (at 0 -3.81 90) (length 2.794) (name "~" (effects (font (size 1.27 1.27)))) (number "2" (effects (font (size 1.27 1.27)))))
		)
	)"#;

/// `Device:LED`: cathode (1) at (-3.81, 0), anode (2) at (3.81, 0).
pub const LED: &str = r#"(symbol "LED"
		(pin_numbers hide)
		(in_bom yes)
		(on_board yes)
		(property "Reference" "D" (at 0 2.54 0) (effects (font (size 1.27 1.27))))
		(property "Value" "LED" (at 0 -2.54 0) (effects (font (size 1.27 1.27))))
		(property "Footprint" "" (at 0 0 0) (effects (font (size 1.27 1.27)) (hide yes)))
		(property "Datasheet" "~" (at 0 0 0) (effects (font (size 1.27 1.27)) (hide yes)))
		(symbol "LED_1_1"
			(pin passive line (at -3.81 0 0) (length 2.54) (name "K" (effects (font (size 1.27 1.27)))) (number "1" (effects (font (size 1.27 1.27)))))
			(pin passive line (at 3.81 0 180) (length 2.54) (name "A" (effects (font (size 1.27 1.27)))) (number "2" (effects (font (size 1.27 1.27)))))
		)
	)"#;

/// Derived resistor with its own value and a default footprint.
pub const RESISTOR_US: &str = r#"(symbol "R_US"
		(extends "R")
		(property "Reference" "R" (at 2.54 0 90) (effects (font (size 1.27 1.27))))
		(property "Value" "R_US" (at -2.54 0 90) (effects (font (size 1.27 1.27))))
		(property "Footprint" "Resistor_SMD:R_0603_1608Metric" (at 1.016 -0.254 90) (effects (font (size 1.27 1.27)) (hide yes)))
	)"#;

/// `Connector_Generic:Conn_01x02`.
pub const CONN_01X02: &str = r#"(symbol "Conn_01x02"
		(in_bom yes)
		(on_board yes)
		(property "Reference" "J" (at 0 2.54 0) (effects (font (size 1.27 1.27))))
		(property "Value" "Conn_01x02" (at 0 -5.08 0) (effects (font (size 1.27 1.27))))
		(property "Footprint" "" (at 0 0 0) (effects (font (size 1.27 1.27)) (hide yes)))
		(property "Datasheet" "~" (at 0 0 0) (effects (font (size 1.27 1.27)) (hide yes)))
		(symbol "Conn_01x02_1_1"
			(pin passive line (at -5.08 0 0) (length 3.81) (name "Pin_1" (effects (font (size 1.27 1.27)))) (number "1" (effects (font (size 1.27 1.27)))))
			(pin passive line (at -5.08 -2.54 0) (length 3.81) (name "Pin_2" (effects (font (size 1.27 1.27)))) (number "2" (effects (font (size 1.27 1.27)))))
		)
	)"#;

/// Wrap definitions in a `(kicad_symbol_lib ...)` file.
pub fn symbol_library(definitions: &[&str]) -> String {
    let mut out = String::from(
        "(kicad_symbol_lib\n\t(version 20231120)\n\t(generator \"kicad_symbol_editor\")\n\t(generator_version \"8.0\")\n",
    );
    for def in definitions {
        out.push('\t');
        out.push_str(def);
        out.push('\n');
    }
    out.push_str(")\n");
    out
}

/// `Device.kicad_sym` with R, C, LED and R_US.
pub fn device_library() -> String {
    symbol_library(&[RESISTOR, CAPACITOR, LED, RESISTOR_US])
}

/// Rename a bare definition to `library:name`, the form used inside `lib_symbols`.
pub fn qualified(definition: &str, library: &str) -> String {
    definition.replacen("(symbol \"", &format!("(symbol \"{library}:"), 1)
}

/// A placed symbol.
#[derive(Debug, Clone)]
pub struct Instance {
    pub lib_id: String,
    pub reference: String,
    pub value: String,
    pub at: (f64, f64),
    pub rotation: f64,
    pub mirror: Option<char>,
    pub template: bool,
}

impl Instance {
    pub fn new(lib_id: &str, reference: &str, value: &str, at: (f64, f64)) -> Self {
        Self {
            lib_id: lib_id.to_string(),
            reference: reference.to_string(),
            value: value.to_string(),
            at,
            rotation: 0.0,
            mirror: None,
            template: false,
        }
    }

    pub fn rotated(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn mirrored(mut self, axis: char) -> Self {
        self.mirror = Some(axis);
        self
    }

    /// Off-canvas, do-not-populate instance as template instances are written.
    pub fn template(mut self) -> Self {
        self.template = true;
        self
    }
}

/// Builds `.kicad_sch` text.
#[derive(Debug, Clone)]
pub struct SchematicBuilder {
    lib_symbols: Option<Vec<String>>,
    body: Vec<String>,
    anchor: bool,
    uuid_counter: u32,
}

impl Default for SchematicBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchematicBuilder {
    pub fn new() -> Self {
        Self {
            lib_symbols: Some(Vec::new()),
            body: Vec::new(),
            anchor: true,
            uuid_counter: 0,
        }
    }

    fn next_uuid(&mut self) -> String {
        self.uuid_counter += 1;
        format!("00000000-0000-4000-8000-{:012}", self.uuid_counter)
    }

    /// Add a definition (already named `Lib:Name`) to `lib_symbols`.
    pub fn lib_symbol(mut self, definition: &str) -> Self {
        if let Some(defs) = self.lib_symbols.as_mut() {
            defs.push(definition.to_string());
        }
        self
    }

    /// Add `Device:R`, `Device:C` and `Device:LED` definitions.
    pub fn with_device_symbols(self) -> Self {
        self.lib_symbol(&qualified(RESISTOR, "Device"))
            .lib_symbol(&qualified(CAPACITOR, "Device"))
            .lib_symbol(&qualified(LED, "Device"))
    }

    pub fn without_lib_symbols(mut self) -> Self {
        self.lib_symbols = None;
        self
    }

    pub fn without_anchor(mut self) -> Self {
        self.anchor = false;
        self
    }

    pub fn instance(mut self, instance: Instance) -> Self {
        let uuid = self.next_uuid();
        let (x, y) = instance.at;
        let (in_bom, on_board, dnp) = if instance.template {
            ("no", "no", "yes")
        } else {
            ("yes", "yes", "no")
        };
        let mirror = instance
            .mirror
            .map(|axis| format!("\t\t(mirror {axis})\n"))
            .unwrap_or_default();
        self.body.push(format!(
            "\t(symbol\n\t\t(lib_id \"{lib_id}\")\n\t\t(at {x} {y} {rot})\n{mirror}\t\t(unit 1)\n\t\t(exclude_from_sim no)\n\t\t(in_bom {in_bom})\n\t\t(on_board {on_board})\n\t\t(dnp {dnp})\n\t\t(uuid \"{uuid}\")\n\t\t(property \"Reference\" \"{reference}\"\n\t\t\t(at {x} {ref_y} 0)\n\t\t\t(effects\n\t\t\t\t(font\n\t\t\t\t\t(size 1.27 1.27)\n\t\t\t\t)\n\t\t\t)\n\t\t)\n\t\t(property \"Value\" \"{value}\"\n\t\t\t(at {x} {value_y} 0)\n\t\t\t(effects\n\t\t\t\t(font\n\t\t\t\t\t(size 1.27 1.27)\n\t\t\t\t)\n\t\t\t)\n\t\t)\n\t\t(property \"Footprint\" \"\"\n\t\t\t(at {x} {y} 0)\n\t\t\t(effects\n\t\t\t\t(font\n\t\t\t\t\t(size 1.27 1.27)\n\t\t\t\t)\n\t\t\t\t(hide yes)\n\t\t\t)\n\t\t)\n\t)",
            lib_id = instance.lib_id,
            rot = instance.rotation,
            reference = instance.reference,
            value = instance.value,
            ref_y = y - 2.54,
            value_y = y + 2.54,
        ));
        self
    }

    pub fn wire(mut self, points: &[(f64, f64)]) -> Self {
        let uuid = self.next_uuid();
        let pts = points
            .iter()
            .map(|(x, y)| format!("(xy {x} {y})"))
            .collect::<Vec<_>>()
            .join(" ");
        self.body.push(format!(
            "\t(wire\n\t\t(pts\n\t\t\t{pts}\n\t\t)\n\t\t(stroke\n\t\t\t(width 0)\n\t\t\t(type default)\n\t\t)\n\t\t(uuid \"{uuid}\")\n\t)"
        ));
        self
    }

    pub fn label(self, text: &str, at: (f64, f64)) -> Self {
        self.label_of_kind("label", text, at)
    }

    pub fn global_label(self, text: &str, at: (f64, f64)) -> Self {
        self.label_of_kind("global_label", text, at)
    }

    fn label_of_kind(mut self, kind: &str, text: &str, (x, y): (f64, f64)) -> Self {
        let uuid = self.next_uuid();
        self.body.push(format!(
            "\t({kind} \"{text}\"\n\t\t(at {x} {y} 0)\n\t\t(fields_autoplaced yes)\n\t\t(effects\n\t\t\t(font\n\t\t\t\t(size 1.27 1.27)\n\t\t\t)\n\t\t\t(justify left bottom)\n\t\t)\n\t\t(uuid \"{uuid}\")\n\t)"
        ));
        self
    }

    pub fn no_connect(mut self, (x, y): (f64, f64)) -> Self {
        let uuid = self.next_uuid();
        self.body
            .push(format!("\t(no_connect\n\t\t(at {x} {y})\n\t\t(uuid \"{uuid}\")\n\t)"));
        self
    }

    /// Raw top-level text, inserted as-is.
    pub fn raw(mut self, text: &str) -> Self {
        self.body.push(text.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut out = String::from(
            "(kicad_sch\n\t(version 20231120)\n\t(generator \"eeschema\")\n\t(generator_version \"8.0\")\n\t(uuid \"7d5ac0f4-3a5c-4d8e-9d35-2f4c0e6f9a10\")\n\t(paper \"A4\")\n",
        );
        if let Some(defs) = &self.lib_symbols {
            out.push_str("\t(lib_symbols");
            for def in defs {
                out.push_str("\n\t\t");
                out.push_str(&def.replace("\n\t", "\n\t\t"));
            }
            out.push_str(if defs.is_empty() { ")\n" } else { "\n\t)\n" });
        }
        for item in &self.body {
            out.push_str(item);
            out.push('\n');
        }
        if self.anchor {
            out.push_str("\t(sheet_instances\n\t\t(path \"/\"\n\t\t\t(page \"1\")\n\t\t)\n\t)\n");
        }
        out.push_str(")\n");
        out
    }
}
