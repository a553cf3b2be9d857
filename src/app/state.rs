use super::{ComponentState, PosecamOrchestrator};
use std::collections::HashMap;
use tracing::debug;

impl PosecamOrchestrator {
    /// Update component state
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock().await;
        let previous = states.insert(component.to_string(), state);
        if previous != Some(state) {
            debug!("Component '{}' state changed to: {:?}", component, state);
        }
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        let states = self.component_states.lock().await;
        states.get(component).copied()
    }

    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        let states = self.component_states.lock().await;
        states.clone()
    }

    /// Names of components currently in `state`, sorted
    pub async fn components_in(&self, state: ComponentState) -> Vec<String> {
        let states = self.component_states.lock().await;
        let mut names: Vec<String> = states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}
