//! Fixed system prompts for the three pipeline stages.
//!
//! Each stage pins its own prompt; callers only supply data. The prompts
//! declare the exact JSON shapes the stage parsers expect.

/// Structuring: raw OCR text → the clinical record schema.
pub const STRUCTURING_PROMPT: &str = "\
You are a medical data entry specialist. Convert the text below into valid JSON matching this schema:
{
  \"patient\": {\"full_name\": \"string\", \"dob\": \"YYYY-MM-DD\", \"mrn\": \"string\"},
  \"encounter\": {\"date\": \"YYYY-MM-DD\", \"provider\": \"string\", \"facility\": \"string\"},
  \"clinical\": {
    \"diagnosis_list\": [\"string\"],
    \"medications\": [{\"name\": \"string\", \"dosage\": \"string\", \"frequency\": \"string\"}],
    \"vitals\": {\"bp\": \"string\", \"hr\": \"string\", \"temp\": \"string\", \"weight\": \"string\"}
  }
}
Return ONLY JSON.";

/// Reasoning: current vs. past visit → trends, consistency alerts, summary.
pub const REASONING_PROMPT: &str = "\
You are a Clinical Decision Support System. Compare the Current Visit vs Past History.
Task 1: TRENDS. Compare Vitals (BP, Weight, HR). State if they are Increasing, Decreasing, or Stable.
Task 2: CONSISTENCY. Check if prescribed medications match the diagnoses.

Output JSON:
{
  \"alerts\": [\"High Priority Alert\", \"Medium Priority Warning\"],
  \"trends\": [{\"metric\": \"BP\", \"status\": \"Worsening\", \"details\": \"120/80 -> 140/90\"}],
  \"summary\": \"Brief clinical summary of changes.\"
}";

/// Coverage: diagnoses vs. policy text → eligibility determination.
pub const COVERAGE_PROMPT: &str = "\
You are an Insurance Claims Adjuster.
Review the MEDICAL_DATA (Diagnosis & Treatments) and the INSURANCE_POLICY summary.

Determine if the patient's condition is likely covered.
1. Match Diagnosis against Policy Inclusions/Exclusions.
2. Check for waiting periods or pre-existing condition clauses.

Output JSON:
{
  \"eligible\": true/false,
  \"confidence\": \"High/Medium/Low\",
  \"reasoning\": \"Explanation of why it is covered or rejected.\",
  \"missing_info\": [\"List of documents or details needed to confirm\"]
}";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structuring_prompt_declares_schema_sections() {
        assert!(STRUCTURING_PROMPT.contains("\"patient\""));
        assert!(STRUCTURING_PROMPT.contains("\"encounter\""));
        assert!(STRUCTURING_PROMPT.contains("\"clinical\""));
        assert!(STRUCTURING_PROMPT.contains("Return ONLY JSON"));
    }

    #[test]
    fn reasoning_prompt_covers_trends_and_consistency() {
        assert!(REASONING_PROMPT.contains("TRENDS"));
        assert!(REASONING_PROMPT.contains("CONSISTENCY"));
        assert!(REASONING_PROMPT.contains("\"summary\""));
    }

    #[test]
    fn coverage_prompt_covers_exclusions_and_waiting_periods() {
        assert!(COVERAGE_PROMPT.contains("Inclusions/Exclusions"));
        assert!(COVERAGE_PROMPT.contains("waiting periods"));
        assert!(COVERAGE_PROMPT.contains("\"eligible\""));
    }
}
