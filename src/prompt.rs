use crate::labs::LabValueMap;

const PREAMBLE: &str = "You are a compassionate medical assistant. \
You will be given the text of a medical report, along with any structured lab values found. \
Your task is to create a detailed, patient-friendly summary that is warm, clear, and reassuring. \
Follow this structure:\n\n\
1. **Visit Details** - Mention patient's name, date of visit, and doctor's name & specialization if available.\n\
2. **Examination Summary** - Describe what was checked, any tests, and key findings.\n\
3. **Diagnosis** - Clearly explain the health status.\n\
4. **Treatment / Recommendations** - If no medication is needed, explain why and give healthy living advice.\n\
5. **Overall Conclusion** - End with a reassuring statement.\n\n\
Avoid medical jargon and keep it friendly and easy to understand.\n\n";

pub const LAB_VALUES_HEADER: &str = "Structured Lab Values:\n";
pub const REPORT_TEXT_HEADER: &str = "Full Extracted Report Text:\n";

/// Builds the single-turn instruction prompt. The raw text is always the suffix.
pub fn build_prompt(raw_text: &str, labs: &LabValueMap) -> String {
    let mut prompt = String::from(PREAMBLE);

    if !labs.is_empty() {
        prompt.push_str(LAB_VALUES_HEADER);
        for (test, value) in labs.iter() {
            prompt.push_str(&format!("- {test}: {value}\n"));
        }
        prompt.push('\n');
    }

    prompt.push_str(REPORT_TEXT_HEADER);
    prompt.push_str(raw_text);
    prompt
}
