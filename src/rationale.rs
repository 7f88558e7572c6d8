//! Plain-language rationale for candidate dopants

use crate::dopant_catalog::DopantRecord;

/// Reference cation oxidation state (Ti(IV) in TiO2)
const HOST_OXIDATION_STATE: i32 = 4;

/// Rule-based chemical rationale for trying a dopant next.
///
/// Every rule that fires contributes one clause; clauses are joined with "; ".
pub fn generate_rationale(record: &DopantRecord) -> String {
    let mut notes = Vec::new();
    let el = &record.element;
    let ox = record.oxidation_state;

    if ox == HOST_OXIDATION_STATE {
        notes.push("isovalent with Ti(IV), minimal charge compensation needed".to_string());
    } else if ox > HOST_OXIDATION_STATE {
        notes.push(format!("aliovalent ({el}({ox}+)), may create electron-rich sites"));
    } else {
        notes.push(format!("aliovalent ({el}({ox}+)), may create oxygen vacancies"));
    }

    if record.ionic_radius_ang > 0.7 {
        notes.push("larger ionic radius may expand adsorption pocket".to_string());
    }
    if record.d_electrons > 3 {
        notes.push(format!(
            "d{} configuration may enable Kubas-type binding",
            record.d_electrons
        ));
    }

    if notes.is_empty() {
        "standard dopant candidate".to_string()
    } else {
        notes.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dopant_catalog::lookup;

    #[test]
    fn test_isovalent_dopant() {
        let hf = lookup("Hf").unwrap();
        let rationale = generate_rationale(hf);
        assert!(rationale.contains("isovalent"));
        assert!(rationale.contains("larger ionic radius"));
        assert!(!rationale.contains("Kubas"));
    }

    #[test]
    fn test_aliovalent_dopants() {
        let v = generate_rationale(lookup("V").unwrap());
        assert_eq!(v, "aliovalent (V(5+)), may create electron-rich sites");

        let al = generate_rationale(lookup("Al").unwrap());
        assert!(al.contains("aliovalent (Al(3+))"));
        assert!(al.contains("oxygen vacancies"));
    }

    #[test]
    fn test_kubas_clause_for_high_d_count() {
        let mo = generate_rationale(lookup("Mo").unwrap());
        assert!(mo.contains("aliovalent"));
        assert!(mo.contains("d5 configuration may enable Kubas-type binding"));
    }

    #[test]
    fn test_all_clauses_are_joined() {
        let record = DopantRecord {
            element: "Xx".to_string(),
            atomic_number: 0,
            electronegativity: 1.0,
            ionic_radius_ang: 0.9,
            d_electrons: 7,
            oxidation_state: 2,
            atomic_mass: 1.0,
        };
        let rationale = generate_rationale(&record);
        assert_eq!(rationale.split("; ").count(), 3);
    }
}
