mod constellation;
mod io;
mod orchestrator;
mod outage;
mod sim_time;
mod simulator;
