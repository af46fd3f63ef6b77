//! Scientific domains: keyword classification and the built-in knowledge base.

use crate::schemas::PredictedParameters;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A keyword-matched scientific category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Physics,
    Chemistry,
    Biology,
    Environmental,
    Engineering,
    Medicine,
    General,
}

const WHOLE_WORD_BELOW: usize = 4;

/// Classification order; on equal scores the later domain wins.
const CLASSIFIED: [Domain; 6] = [
    Domain::Physics,
    Domain::Chemistry,
    Domain::Biology,
    Domain::Environmental,
    Domain::Engineering,
    Domain::Medicine,
];

impl Domain {
    pub const ALL: [Domain; 7] = [
        Domain::Physics,
        Domain::Chemistry,
        Domain::Biology,
        Domain::Environmental,
        Domain::Engineering,
        Domain::Medicine,
        Domain::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Physics => "physics",
            Domain::Chemistry => "chemistry",
            Domain::Biology => "biology",
            Domain::Environmental => "environmental",
            Domain::Engineering => "engineering",
            Domain::Medicine => "medicine",
            Domain::General => "general",
        }
    }

    /// Parse a domain name; unknown names map to [`Domain::General`].
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == name)
            .unwrap_or(match name.as_str() {
                "environmental_science" | "environment" => Domain::Environmental,
                _ => Domain::General,
            })
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Domain::Physics => &[
                "force",
                "energy",
                "motion",
                "temperature",
                "pressure",
                "electromagnetic",
                "quantum",
                "gravity",
                "oscillation",
                "wave",
            ],
            Domain::Chemistry => &[
                "reaction",
                "chemical",
                "molecule",
                "catalyst",
                "ph",
                "concentration",
                "element",
                "compound",
                "bond",
            ],
            Domain::Biology => &[
                "plant",
                "animal",
                "cell",
                "organism",
                "growth",
                "evolution",
                "gene",
                "protein",
                "ecosystem",
                "species",
            ],
            Domain::Environmental => &[
                "climate",
                "pollution",
                "ecosystem",
                "carbon",
                "greenhouse",
                "sustainability",
                "water quality",
            ],
            Domain::Engineering => &[
                "efficiency",
                "design",
                "material",
                "structure",
                "optimization",
                "performance",
            ],
            Domain::Medicine => &[
                "health",
                "disease",
                "treatment",
                "drug",
                "symptom",
                "therapy",
                "diagnosis",
            ],
            Domain::General => &[],
        }
    }

    /// Number of keywords of this domain found in `text`.
    ///
    /// Keywords shorter than four characters must match a whole word, so
    /// "ph" hits "pH" but not "phase" or "photon".
    pub fn score(&self, text: &str) -> usize {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        self.keywords()
            .iter()
            .filter(|keyword| {
                if keyword.len() < WHOLE_WORD_BELOW {
                    words.contains(keyword)
                } else {
                    lower.contains(*keyword)
                }
            })
            .count()
    }

    /// Classify a question by keyword hits. Returns `General` when nothing matches.
    pub fn classify(question: &str) -> Self {
        let mut best = (Domain::General, 0);
        for domain in CLASSIFIED {
            let score = domain.score(question);
            if score > 0 && score >= best.1 {
                best = (domain, score);
            }
        }
        best.0
    }

    /// Characteristic time scale of experiments in this domain.
    pub fn time_scale(&self) -> &'static str {
        match self {
            Domain::Physics => "seconds to hours",
            Domain::Chemistry => "minutes to days",
            Domain::Biology => "hours to months",
            Domain::Environmental => "days to years",
            Domain::Engineering => "minutes to hours",
            Domain::Medicine => "hours to weeks",
            Domain::General => "variable",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One topic of the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeTopic {
    pub name: &'static str,
    pub equations: &'static [&'static str],
    pub concepts: &'static [&'static str],
}

const fn topic(
    name: &'static str,
    equations: &'static [&'static str],
    concepts: &'static [&'static str],
) -> KnowledgeTopic {
    KnowledgeTopic {
        name,
        equations,
        concepts,
    }
}

const MECHANICS: KnowledgeTopic = topic(
    "mechanics",
    &["F=ma", "E=mc²", "F=kx", "τ=Iα"],
    &["energy conservation", "momentum", "oscillations", "waves"],
);
const THERMODYNAMICS: KnowledgeTopic = topic(
    "thermodynamics",
    &["PV=nRT", "ΔU=Q-W", "S=k ln W"],
    &["heat transfer", "entropy", "phase transitions"],
);
const ELECTROMAGNETISM: KnowledgeTopic = topic(
    "electromagnetism",
    &["F=qE", "B=μI/2πr", "∇×E=-∂B/∂t"],
    &["electric fields", "magnetic fields", "electromagnetic induction"],
);
const KINETICS: KnowledgeTopic = topic(
    "kinetics",
    &["rate = k[A]^m[B]^n", "k = Ae^(-Ea/RT)"],
    &["reaction rates", "activation energy", "catalysis"],
);
const THERMOCHEMISTRY: KnowledgeTopic = topic(
    "thermochemistry",
    &["ΔH = ΣH_products - ΣH_reactants", "ΔG = ΔH - TΔS"],
    &["enthalpy", "entropy", "spontaneity"],
);
const EQUILIBRIUM: KnowledgeTopic = topic(
    "equilibrium",
    &["K = [products]/[reactants]", "ΔG° = -RT ln K"],
    &["Le Chatelier's principle", "equilibrium constants"],
);
const ECOLOGY: KnowledgeTopic = topic(
    "ecology",
    &["dN/dt = rN(1-N/K)", "Shannon H = -Σpi ln pi"],
    &["population growth", "carrying capacity", "biodiversity"],
);
const PHYSIOLOGY: KnowledgeTopic = topic(
    "physiology",
    &["V = TV × RR", "CO = HR × SV"],
    &["homeostasis", "feedback loops", "metabolism"],
);
const GENETICS: KnowledgeTopic = topic(
    "genetics",
    &["p² + 2pq + q² = 1", "F = (Ho - He)/He"],
    &["Hardy-Weinberg equilibrium", "inheritance patterns"],
);
const CLIMATE: KnowledgeTopic = topic(
    "climate",
    &["S = σT⁴", "ΔT = λ × ΔF"],
    &["greenhouse effect", "carbon cycle", "climate feedback"],
);

fn base_topics(domain: Domain) -> &'static [KnowledgeTopic] {
    match domain {
        Domain::Physics => &[MECHANICS, THERMODYNAMICS, ELECTROMAGNETISM],
        Domain::Chemistry => &[KINETICS, THERMOCHEMISTRY, EQUILIBRIUM],
        Domain::Biology => &[ECOLOGY, PHYSIOLOGY, GENETICS],
        Domain::Environmental => &[CLIMATE],
        Domain::Engineering | Domain::Medicine | Domain::General => &[],
    }
}

/// Knowledge-base topics relevant to a question.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DomainKnowledge {
    pub topics: Vec<KnowledgeTopic>,
}

impl DomainKnowledge {
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn topic_names(&self) -> Vec<String> {
        self.topics.iter().map(|t| t.name.to_string()).collect()
    }

    /// `{topic: {equations, concepts}}` for prompt rendering.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .topics
            .iter()
            .map(|t| {
                (
                    t.name.to_string(),
                    serde_json::json!({"equations": t.equations, "concepts": t.concepts}),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }

    fn add(&mut self, topic: KnowledgeTopic) {
        if !self.topics.iter().any(|t| t.name == topic.name) {
            self.topics.push(topic);
        }
    }
}

/// Topics for `domain`, cross-linked by wording in `question`.
///
/// Mentions of "temperature" pull in thermodynamics outside physics, and
/// mentions of "rate" pull in kinetics outside chemistry.
pub fn domain_knowledge(domain: Domain, question: &str) -> DomainKnowledge {
    let mut knowledge = DomainKnowledge {
        topics: base_topics(domain).to_vec(),
    };
    let lower = question.to_lowercase();
    if lower.contains("temperature") && domain != Domain::Physics {
        knowledge.add(THERMODYNAMICS);
    }
    if lower.contains("rate") && domain != Domain::Chemistry {
        knowledge.add(KINETICS);
    }
    knowledge
}

/// Offline literature summary assembled from the built-in tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiteratureReview {
    pub sources: Vec<String>,
    pub key_findings: String,
    pub research_gaps: String,
    pub established_principles: DomainKnowledge,
}

pub fn literature_sources(domain: Domain) -> &'static [&'static str] {
    match domain {
        Domain::Physics => &[
            "Physical Review Letters",
            "Nature Physics",
            "Journal of Applied Physics",
            "Classical Mechanics textbooks",
            "Quantum Mechanics references",
        ],
        Domain::Chemistry => &[
            "Journal of the American Chemical Society",
            "Nature Chemistry",
            "Chemical Reviews",
            "Physical Chemistry textbooks",
        ],
        Domain::Biology => &[
            "Nature",
            "Science",
            "Cell",
            "Journal of Experimental Biology",
            "Molecular Biology texts",
            "Ecology references",
        ],
        Domain::Environmental => &[
            "Environmental Science & Technology",
            "Nature Climate Change",
            "Journal of Environmental Quality",
            "Environmental Chemistry texts",
        ],
        _ => &["General scientific journals"],
    }
}

pub fn literature_review(topic: &str, domain: Domain) -> LiteratureReview {
    LiteratureReview {
        sources: literature_sources(domain)
            .iter()
            .map(|s| s.to_string())
            .collect(),
        key_findings: format!("Literature review for {} in {} domain", topic, domain),
        research_gaps: format!("Limited studies on specific aspects of {}", topic),
        established_principles: domain_knowledge(domain, topic),
    }
}

/// Measurement guidance for experiment design.
pub fn predicted_parameters(domain: Domain) -> PredictedParameters {
    let (ranges, precision, controls) = match domain {
        Domain::Physics => (
            "Standard SI units",
            "±1% for quantitative measurements",
            "Temperature, pressure, humidity",
        ),
        Domain::Chemistry => (
            "Concentration: 0.1-10 M, Temperature: 0-100°C",
            "±0.1 M for concentrations, ±1°C for temperature",
            "pH, pressure, stirring rate",
        ),
        Domain::Biology => (
            "Growth rates, population counts, biomass",
            "±5% for biological measurements",
            "Light, nutrients, temperature, pH",
        ),
        _ => (
            "Domain-appropriate ranges",
            "Standard scientific precision",
            "Relevant environmental factors",
        ),
    };
    PredictedParameters {
        measurement_ranges: ranges.to_string(),
        precision_requirements: precision.to_string(),
        control_conditions: controls.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_physics() {
        assert_eq!(
            Domain::classify("How does force affect acceleration?"),
            Domain::Physics
        );
        assert_eq!(
            Domain::classify("How does temperature affect electrical resistance?"),
            Domain::Physics
        );
    }

    #[test]
    fn test_classify_tie_prefers_later_domain() {
        assert_eq!(
            Domain::classify("How does temperature affect reaction rate?"),
            Domain::Chemistry
        );
    }

    #[test]
    fn test_classify_other_domains() {
        assert_eq!(
            Domain::classify("How does temperature affect plant growth?"),
            Domain::Biology
        );
        assert_eq!(
            Domain::classify("What drives the greenhouse effect on climate?"),
            Domain::Environmental
        );
        assert_eq!(
            Domain::classify("How does drug dosage change treatment outcomes?"),
            Domain::Medicine
        );
        assert_eq!(
            Domain::classify("Which material structure maximizes efficiency?"),
            Domain::Engineering
        );
        assert_eq!(Domain::classify("What is the meaning of life?"), Domain::General);
    }

    #[test]
    fn test_classify_ph_case_insensitive() {
        assert_eq!(Domain::classify("Does pH alter enzymes?"), Domain::Chemistry);
        assert_eq!(Domain::classify("How does (ph) shift the bond?"), Domain::Chemistry);
    }

    #[test]
    fn test_short_keyword_ignores_longer_words() {
        assert_eq!(
            Domain::classify("What causes the phase change at a given pressure?"),
            Domain::Physics
        );
        assert_eq!(
            Domain::classify("How does the energy of a photon relate to frequency?"),
            Domain::Physics
        );
        assert_eq!(Domain::Chemistry.score("phenomenon graph physics photosynthesis"), 0);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Domain::from_name("Physics"), Domain::Physics);
        assert_eq!(
            Domain::from_name("environmental_science"),
            Domain::Environmental
        );
        assert_eq!(Domain::from_name("astrology"), Domain::General);
        assert_eq!(Domain::Biology.to_string(), "biology");
    }

    #[test]
    fn test_knowledge_base_domains() {
        assert_eq!(
            domain_knowledge(Domain::Physics, "").topic_names(),
            vec!["mechanics", "thermodynamics", "electromagnetism"]
        );
        assert_eq!(
            domain_knowledge(Domain::Environmental, "").topic_names(),
            vec!["climate"]
        );
        assert!(domain_knowledge(Domain::General, "").is_empty());
    }

    #[test]
    fn test_cross_domain_knowledge() {
        let bio = domain_knowledge(Domain::Biology, "Does temperature change growth rate?");
        let names = bio.topic_names();
        assert!(names.contains(&"thermodynamics".to_string()));
        assert!(names.contains(&"kinetics".to_string()));

        let phys = domain_knowledge(Domain::Physics, "temperature");
        assert_eq!(phys.topics.len(), 3);
    }

    #[test]
    fn test_knowledge_json_shape() {
        let json = domain_knowledge(Domain::Chemistry, "").to_json();
        assert_eq!(json["kinetics"]["equations"][1], "k = Ae^(-Ea/RT)");
    }

    #[test]
    fn test_literature_review() {
        let review = literature_review("photosynthesis", Domain::Biology);
        assert_eq!(review.sources.len(), 6);
        assert_eq!(
            review.key_findings,
            "Literature review for photosynthesis in biology domain"
        );
        let general = literature_review("x", Domain::Medicine);
        assert_eq!(general.sources, vec!["General scientific journals"]);
    }

    #[test]
    fn test_predicted_parameters() {
        assert_eq!(
            predicted_parameters(Domain::Physics).measurement_ranges,
            "Standard SI units"
        );
        assert_eq!(
            predicted_parameters(Domain::Engineering).precision_requirements,
            "Standard scientific precision"
        );
    }
}
