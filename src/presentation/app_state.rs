// Application state for HTTP handlers
use crate::application::aggregation_service::PlantPerformanceService;
use crate::application::chart_session::ChartSessionService;
use crate::application::tradeoff_service::TradeoffService;

#[derive(Clone)]
pub struct AppState {
    pub plant_performance: PlantPerformanceService,
    pub tradeoff: TradeoffService,
    pub chart_sessions: ChartSessionService,
}
