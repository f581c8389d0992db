mod risk_factors;
mod session_results;
