//! Default library symbols for generic component kinds.

/// Kind keyword to `(library, symbol)`.
const DEFAULT_SYMBOLS: &[(&str, (&str, &str))] = &[
    ("resistor", ("Device", "R")),
    ("capacitor", ("Device", "C")),
    ("inductor", ("Device", "L")),
    ("diode", ("Device", "D")),
    ("led", ("Device", "LED")),
    ("transistor_npn", ("Device", "Q_NPN_BCE")),
    ("transistor_pnp", ("Device", "Q_PNP_BCE")),
    ("opamp", ("Amplifier_Operational", "OpAmp_Dual_Generic")),
    ("microcontroller", ("MCU_Module", "Arduino_UNO_R3")),
];

const FALLBACK: (&str, &str) = ("Device", "R");

/// Library and symbol to use for a component kind such as `"capacitor"`.
///
/// Matching is case-insensitive; a kind that merely contains a known keyword
/// (`"ceramic_capacitor"`) uses that keyword's symbol. Unknown kinds get a
/// resistor.
pub fn default_symbol_for(kind: &str) -> (&'static str, &'static str) {
    let kind = kind.trim().to_ascii_lowercase();
    if let Some((_, symbol)) = DEFAULT_SYMBOLS.iter().find(|(key, _)| *key == kind) {
        return *symbol;
    }
    DEFAULT_SYMBOLS
        .iter()
        .find(|(key, _)| kind.contains(key) || (!kind.is_empty() && key.contains(kind.as_str())))
        .map(|(_, symbol)| *symbol)
        .unwrap_or(FALLBACK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_partial_kinds() {
        assert_eq!(default_symbol_for("Capacitor"), ("Device", "C"));
        assert_eq!(default_symbol_for("ceramic_capacitor"), ("Device", "C"));
        assert_eq!(default_symbol_for("pnp"), ("Device", "Q_PNP_BCE"));
        assert_eq!(
            default_symbol_for("opamp"),
            ("Amplifier_Operational", "OpAmp_Dual_Generic")
        );
        assert_eq!(default_symbol_for("flux_capacitor_9000"), ("Device", "C"));
        assert_eq!(default_symbol_for("widget"), ("Device", "R"));
        assert_eq!(default_symbol_for(""), ("Device", "R"));
    }
}
