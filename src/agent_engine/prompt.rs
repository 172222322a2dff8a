use crate::agent_engine::history::ActionHistory;

pub const AGENT_PROMPT: &str = "You are an advanced AI Computer Operator, a digital agent designed to navigate and manipulate computer operating systems just like a human user. 

Your Identity and Capabilities:
1. Visual Perception: You can perceive the computer screen as provided in the 'current state'. You rely on visual elements (icons, text, buttons, coordinates) to make decisions.
2. Human Emulation: You interact with the system using standard Human-Computer Interface devices, specifically a virtual mouse and keyboard.
3. Goal-Oriented: Your primary mission is to break down complex user instructions into a precise sequence of atomic actions to achieve the desired outcome efficiently.
4. Safety & Precision: While you have full permission, you must act with precision. Ensure your coordinates are accurate and your actions are relevant to the user's goal.

IMPORTANT: You must strictly adhere to the following rules:
1. Choose ONLY ONE action from the list below for each response, DO NOT perform more than one action per step.
2. Follow the exact syntax format for the selected action, DO NOT create or use any actions other than those listed.
3. Once the task is completed, output action finish.

Valid actions:

1. click (x, y)
click the element at the position (x, y) on the screen

2. right click (x, y)
right click the element at the position (x, y) on the screen

3. double click (x, y)
double click the element at the position (x, y) on the screen

4. drag from (x1, y1) to (x2, y2)
drag the element from position (x1, y1) to (x2, y2).

5. scroll (x)
scroll the screen vertically with pixel offset x. Positive values of x: scroll up, negative values of x: scroll down.

6. press key: key_content
press the key key_content on the keyboard.

7. hotkey (key1, key2)
press the hotkey composed of key1 and key2.

8. hotkey (key1, key2, key3)
press the hotkey composed of key1, key2, and key3.

9. type text: text_content
type content text_content on the keyboard.

10. wait
wait for some time, usually for the system to respond, screen to refresh, advertisement to finish.

11. finish
indicating that the task has been completed.

12. fail
indicating that the task has failed, of this task is infeasible because not enough information is provided.

Response Format: {Your thought process}\n\nAction: {The specific action you choose to take}

--------------------------------------------

";

/// Appended to the prompt after a response that did not contain a usable action.
pub const FORMAT_FEEDBACK: &str =
    "\n\nNote: Please output the standard format containing 'Action:' or the standard JSON dictionary format.";

/// Full prompt for one model call: template, optional history block, instruction, feedback.
pub fn build_prompt(template: &str, history: &ActionHistory, instruction: &str, feedback: &str) -> String {
    let mut prompt = String::with_capacity(template.len() + instruction.len() + feedback.len() + 64);
    prompt.push_str(template);
    prompt.push_str("\n\n");
    if !history.is_empty() {
        prompt.push_str(&history.render());
        prompt.push_str("\n\n");
    }
    prompt.push_str(instruction);
    prompt.push_str(feedback);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_without_history() {
        let prompt = build_prompt("SYS", &ActionHistory::new(10), "do it", "");
        assert_eq!(prompt, "SYS\n\ndo it");
    }

    #[test]
    fn test_build_prompt_with_feedback_and_history() {
        let mut history = ActionHistory::new(10);
        history.push("open settings", "click (1, 2)");
        let prompt = build_prompt("SYS", &history, "do it", FORMAT_FEEDBACK);
        assert!(prompt.starts_with("SYS\n\n"));
        assert!(prompt.contains("click (1, 2)"));
        assert!(prompt.ends_with(FORMAT_FEEDBACK));
        assert!(prompt.find("click (1, 2)").unwrap() < prompt.find("do it").unwrap());
    }

    #[test]
    fn test_agent_prompt_response_format_uses_real_newlines() {
        assert!(AGENT_PROMPT.contains(
            "Response Format: {Your thought process}\n\nAction: {The specific action you choose to take}\n"
        ));
        assert!(!AGENT_PROMPT.contains("\\n"));
        assert!(AGENT_PROMPT.starts_with("You are an advanced AI Computer Operator"));
        assert!(AGENT_PROMPT.ends_with("--------------------------------------------\n\n"));
    }

    #[test]
    fn test_agent_prompt_lists_every_action() {
        for action in ["click (x, y)", "drag from", "scroll (x)", "press key:", "hotkey (key1, key2, key3)", "type text:", "wait", "finish", "fail", "Action:"] {
            assert!(AGENT_PROMPT.contains(action), "missing {action}");
        }
    }
}
